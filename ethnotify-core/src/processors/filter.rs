//! Per-event log filters and their block cursors.

use ethnotify_sdk::objects::LogQuery;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::abi::{ContractHandle, EventDescriptor};

/// Start of a filter's unseen range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockMarker {
    /// Not yet anchored; means "from the first confirmed block we see".
    Latest,
    Number(u64),
}

/// The scope of one event on one contract, plus its cursor.
///
/// Besides the cursor (one past the highest block a log was seen in) the
/// filter remembers the last block it has fetched successfully, so a quiet
/// event only ever asks the node for blocks it has not scanned yet.
#[derive(Debug, Clone)]
pub struct LogFilter {
    contract: Arc<str>,
    event: Arc<EventDescriptor>,
    cursor: BlockMarker,
    scanned_through: Option<u64>,
}

impl LogFilter {
    pub fn new(contract: Arc<str>, event: Arc<EventDescriptor>) -> Self {
        Self {
            contract,
            event,
            cursor: BlockMarker::Latest,
            scanned_through: None,
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn event(&self) -> &Arc<EventDescriptor> {
        &self.event
    }

    /// Next unseen block.
    pub fn cursor(&self) -> BlockMarker {
        self.cursor
    }

    /// Pin a `Latest` cursor to `confirmed + 1`. Anchored cursors are left alone.
    pub fn anchor(&mut self, confirmed: u64) {
        if self.cursor == BlockMarker::Latest {
            self.cursor = BlockMarker::Number(confirmed.saturating_add(1));
        }
    }

    /// Last block fetched without error, if any.
    pub fn scanned_through(&self) -> Option<u64> {
        self.scanned_through
    }

    /// Block range to fetch given the confirmed head, if any.
    pub fn range(&self, confirmed: u64) -> Option<RangeInclusive<u64>> {
        let BlockMarker::Number(cursor) = self.cursor else {
            return None;
        };
        let from = match self.scanned_through {
            Some(scanned) => cursor.max(scanned.saturating_add(1)),
            None => cursor,
        };
        (from <= confirmed).then(|| from..=confirmed)
    }

    /// Record that every block up to `through` has been fetched.
    pub fn mark_scanned(&mut self, through: u64) {
        if self.scanned_through.is_none_or(|scanned| scanned < through) {
            self.scanned_through = Some(through);
        }
    }

    /// Move the cursor forward to `next`. Never moves it backward.
    pub fn advance(&mut self, next: u64) {
        match self.cursor {
            BlockMarker::Number(current) if current >= next => {}
            _ => self.cursor = BlockMarker::Number(next),
        }
    }

    /// `eth_getLogs` parameters for `range`.
    pub fn query(&self, range: &RangeInclusive<u64>) -> LogQuery {
        LogQuery {
            address: self.contract.to_string(),
            topics: vec![self.event.selector().to_string()],
            from_block: *range.start(),
            to_block: *range.end(),
        }
    }
}

/// All filters of all monitored contracts.
#[derive(Debug, Clone, Default)]
pub struct LogFilterSet {
    filters: Vec<LogFilter>,
}

impl LogFilterSet {
    /// One filter per catalog event of every contract.
    pub fn new(contracts: &[ContractHandle]) -> Self {
        let filters = contracts
            .iter()
            .flat_map(|contract| {
                let address: Arc<str> = Arc::from(contract.checksum_address());
                contract
                    .catalog()
                    .events()
                    .iter()
                    .map(move |event| LogFilter::new(address.clone(), event.clone()))
            })
            .collect();
        Self { filters }
    }

    pub fn anchor(&mut self, confirmed: u64) {
        for filter in &mut self.filters {
            filter.anchor(confirmed);
        }
    }

    pub fn filters(&self) -> &[LogFilter] {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut [LogFilter] {
        &mut self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::EventCatalog;
    use crate::testing::{ERC20_ABI, TRANSFER_TOPIC, contract};

    fn transfer_filter() -> LogFilter {
        let catalog = EventCatalog::from_json(ERC20_ABI).unwrap();
        LogFilter::new(Arc::from("0xabc"), catalog.events()[1].clone())
    }

    #[test]
    fn test_anchor_only_once() {
        let mut filter = transfer_filter();
        assert_eq!(filter.cursor(), BlockMarker::Latest);
        assert_eq!(filter.range(1_000), None);

        filter.anchor(99);
        assert_eq!(filter.cursor(), BlockMarker::Number(100));
        filter.anchor(500);
        assert_eq!(filter.cursor(), BlockMarker::Number(100));
    }

    #[test]
    fn test_range_and_query() {
        let mut filter = transfer_filter();
        filter.anchor(99);
        assert_eq!(filter.range(99), None);
        let range = filter.range(105).unwrap();
        assert_eq!(range, 100..=105);

        let query = filter.query(&range);
        assert_eq!(query.address, "0xabc");
        assert_eq!(query.topics, vec![TRANSFER_TOPIC.to_string()]);
        assert_eq!((query.from_block, query.to_block), (100, 105));
    }

    #[test]
    fn test_cursor_never_moves_backward() {
        let mut filter = transfer_filter();
        filter.advance(50);
        assert_eq!(filter.cursor(), BlockMarker::Number(50));
        filter.advance(40);
        assert_eq!(filter.cursor(), BlockMarker::Number(50));
        filter.advance(51);
        assert_eq!(filter.cursor(), BlockMarker::Number(51));
    }

    #[test]
    fn test_quiet_event_range_stays_bounded() {
        let mut filter = transfer_filter();
        filter.anchor(99);

        assert_eq!(filter.range(1_000), Some(100..=1_000));
        filter.mark_scanned(1_000);
        assert_eq!(filter.range(10_000), Some(1_001..=10_000));
        filter.mark_scanned(10_000);
        assert_eq!(filter.range(10_000), None);
        assert_eq!(filter.range(10_050), Some(10_001..=10_050));

        // The cursor is only moved by observed logs
        assert_eq!(filter.cursor(), BlockMarker::Number(100));
        filter.mark_scanned(500);
        assert_eq!(filter.scanned_through(), Some(10_000));

        // A cursor past the watermark wins
        filter.advance(20_000);
        assert_eq!(filter.range(20_010), Some(20_000..=20_010));
    }

    #[test]
    fn test_filter_set_fans_out() {
        let contracts = vec![
            contract("0x6b175474e89094c44da98b954eedeac495271d0f", ERC20_ABI),
            contract("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", ERC20_ABI),
        ];
        let mut set = LogFilterSet::new(&contracts);
        assert_eq!(set.len(), 4);
        set.anchor(10);
        assert!(set.filters().iter().all(|f| f.cursor() == BlockMarker::Number(11)));
        assert!(LogFilterSet::new(&[]).is_empty());
    }
}
