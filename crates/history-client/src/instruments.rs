use replay_core::ReplayError;
use serde::{Deserialize, Serialize};

/// Upstream identity of one tradable ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub instrument_id: String,
    /// Continuous-contract series, only set for futures.
    pub series_id: Option<String>,
}

const DEFAULT_INSTRUMENTS: &[(&str, &str)] = &[
    ("IMOEXF", "5bcff194-f10d-4314-b9ee-56b7fdb344fd"),
    ("GAZP", "962e2a95-02a9-4171-abd7-aa198dbe643a"),
    ("GMKN", "509edd0c-129c-4ee2-934d-7f6246126da1"),
    ("IRKT", "509edd0c-129c-4ee2-934d-7f6246126da1"),
    ("LKOH", "02cfdf61-6298-4c0f-a9ca-9cabc82afaf3"),
    ("MAGN", "cfb50a23-2465-497e-bc7e-e4f0e042cf3d"),
    ("MGNT", "7132b1c9-ee26-4464-b5b5-1046264b61d9"),
    ("MOEX", "ca845f68-6c43-44bc-b584-330d2a1e5eb7"),
    ("MTLR", "5e1c2634-afc4-4e50-ad6d-f78fc14a539a"),
    ("MTSS", "eb4ba863-e85f-4f80-8c29-f2627938ee58"),
    ("NLMK", "cd8063ad-73ad-4b31-bd0d-93138d9e99a2"),
    ("NVTK", "0da66728-6c30-44c4-9264-df8fac2467ee"),
    ("OZON", "161eb0d0-aaac-4451-b374-f5d0eeb1b508"),
    ("PIKK", "75e003c2-ca14-4980-8d7b-e82ec6b6ffe1"),
    ("PLZL", "03d5e771-fc10-438e-8892-85a40733612d"),
    ("PMSB", "10620843-28ce-44e8-80c2-f26ceb1bd3e1"),
    ("POSI", "4d8209f9-3b75-437d-ad5f-2906d56f27e9"),
    ("RNFT", "de08affe-4fbd-454e-9fd1-46a81b23f870"),
    ("ROSN", "c7485564-ed92-45fd-a724-1214aa202904"),
    ("SBER", "fd417230-19cf-4e7b-9623-f7c9ca18ec6b"),
    ("SELG", "e6123145-9665-43e0-8413-cd61b8aa9b13"),
    ("SGZH", "0d28c01b-f841-4e89-9c92-0ee23d12883a"),
    ("SMLT", "7bedd86b-478d-4742-a28c-29d27f8dbc7d"),
    ("SPBE", "4d813ab1-8bc9-4670-89ea-12bfbab6017d"),
    ("T", "15dc2120-29d2-48b8-87c0-da1d95255f68"),
    ("TATN", "87db07bc-0e02-4e29-90bb-05e8ef791d7b"),
    ("TRMK", "88468f6c-c67a-4fb4-a006-53eed803883c"),
    ("UGLD", "278d9ccc-4dde-484e-bf79-49ce8f733470"),
    ("UPRO", "664921c5-b552-47a6-9ced-8735a3c6ca8a"),
    ("UWGN", "17017bf0-ed5c-47be-8fae-c0cedbfabe32"),
    ("VTBR", "8e2b0325-0292-4654-8a18-4f63ed3b0e09"),
    ("X5", "0964acd0-e2cb-4810-a177-ef4ad8856ff0"),
    ("YDEX", "7de75794-a27f-4d81-a39b-492345813822"),
];

const DEFAULT_SERIES: &[(&str, &str)] = &[("IMOEXF", "68a241d2-dd2f-4e99-bae2-edc6d163e957")];

/// Ticker to upstream instrument mapping, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// Registry with every ticker the terminal trades.
    pub fn default_universe() -> Self {
        let instruments = DEFAULT_INSTRUMENTS
            .iter()
            .map(|(ticker, id)| Instrument {
                ticker: ticker.to_string(),
                instrument_id: id.to_string(),
                series_id: DEFAULT_SERIES
                    .iter()
                    .find(|(t, _)| t == ticker)
                    .map(|(_, series)| series.to_string()),
            })
            .collect();
        Self { instruments }
    }

    pub fn resolve(&self, ticker: &str) -> Result<&Instrument, ReplayError> {
        self.instruments
            .iter()
            .find(|i| i.ticker == ticker)
            .ok_or_else(|| ReplayError::UnknownTicker(ticker.to_string()))
    }

    pub fn tickers(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
