//! Fuses the per-family event streams into one totally ordered sequence.
//! Families arrive already sorted from the store, so this is a k-way merge
//! rather than a global sort. Raw transfers that merely mirror another
//! bookkeeping event are suppressed here, before the engine ever sees them.

use {
    crate::{
        conditions::ConditionCatalog,
        events::{
            ChainEvent, EventKey, EventTag, OrderedEvent, RESOLUTION_LOG_INDEX, Resolution,
        },
    },
    alloy_primitives::{Address, B256},
    std::{
        cmp::Reverse,
        collections::{BinaryHeap, HashSet, VecDeque},
    },
};

/// The loader's output, one sorted vector per family.
#[derive(Clone, Debug, Default)]
pub struct StreamInputs {
    pub trades: Vec<OrderedEvent>,
    pub splits: Vec<OrderedEvent>,
    pub merges: Vec<OrderedEvent>,
    pub redemptions: Vec<OrderedEvent>,
    pub adapter_splits: Vec<OrderedEvent>,
    pub adapter_merges: Vec<OrderedEvent>,
    pub adapter_redemptions: Vec<OrderedEvent>,
    pub adapter_conversions: Vec<OrderedEvent>,
    pub transfers: Vec<OrderedEvent>,
    pub fee_refunds: Vec<OrderedEvent>,
    pub fee_withdrawals: Vec<OrderedEvent>,
    pub resolutions: Vec<OrderedEvent>,
}

impl StreamInputs {
    fn bookkeeping_txs(&self) -> HashSet<B256> {
        [
            &self.splits,
            &self.merges,
            &self.redemptions,
            &self.adapter_splits,
            &self.adapter_merges,
            &self.adapter_redemptions,
            &self.adapter_conversions,
        ]
        .into_iter()
        .flatten()
        .filter_map(|event| event.event.tx_hash())
        .collect()
    }

    fn trade_txs(&self) -> HashSet<B256> {
        self.trades
            .iter()
            .filter_map(|event| event.event.tx_hash())
            .collect()
    }
}

/// Synthetic resolution events for every condition the catalog reports as
/// resolved, keyed to sort after all real logs of the resolution block.
pub fn resolution_events(catalog: &ConditionCatalog) -> Vec<OrderedEvent> {
    let mut events: Vec<OrderedEvent> = catalog
        .resolved()
        .map(|condition| OrderedEvent {
            key: EventKey {
                timestamp: condition.resolved_at,
                block_number: condition.resolved_block,
                log_index: RESOLUTION_LOG_INDEX,
                tag: EventTag::Resolution,
            },
            event: ChainEvent::Resolution(Resolution {
                condition_id: condition.id,
            }),
        })
        .collect();
    events.sort_by_key(|event| event.key);
    events
}

/// Builds the unified stream for one wallet.
///
/// Transfer suppression rules:
/// - the token leg of a split/merge/redemption/adapter event (same tx hash)
///   is dropped; the bookkeeping handler reconstructs the movement,
/// - transfers inside a trade transaction operated by an exchange contract
///   are exchange-internal and dropped,
/// - self transfers are dropped.
pub fn unify(
    mut inputs: StreamInputs,
    wallet: Address,
    exchanges: &[Address],
) -> impl Iterator<Item = OrderedEvent> + use<> {
    let bookkeeping = inputs.bookkeeping_txs();
    let trades = inputs.trade_txs();
    inputs.transfers.retain(|event| {
        let ChainEvent::Transfer(transfer) = &event.event else {
            return true;
        };
        if transfer.from == wallet && transfer.to == wallet {
            return false;
        }
        if bookkeeping.contains(&transfer.tx_hash) {
            return false;
        }
        if trades.contains(&transfer.tx_hash) && exchanges.contains(&transfer.operator) {
            return false;
        }
        true
    });

    KWayMerge::new(vec![
        inputs.trades,
        inputs.splits,
        inputs.merges,
        inputs.redemptions,
        inputs.adapter_splits,
        inputs.adapter_merges,
        inputs.adapter_redemptions,
        inputs.adapter_conversions,
        inputs.transfers,
        inputs.fee_refunds,
        inputs.fee_withdrawals,
        inputs.resolutions,
    ])
}

/// Streaming merge over already-sorted sources. Keeps one head per source
/// in a min-heap, so memory stays linear in the number of families.
struct KWayMerge {
    sources: Vec<VecDeque<OrderedEvent>>,
    heap: BinaryHeap<Reverse<(EventKey, usize)>>,
}

impl KWayMerge {
    fn new(sources: Vec<Vec<OrderedEvent>>) -> Self {
        debug_assert!(
            sources
                .iter()
                .all(|source| source.is_sorted_by_key(|event| event.key)),
            "family streams must arrive sorted"
        );
        let sources: Vec<VecDeque<OrderedEvent>> =
            sources.into_iter().map(VecDeque::from).collect();
        let heap = sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| source.front().map(|event| Reverse((event.key, index))))
            .collect();
        Self { sources, heap }
    }
}

impl Iterator for KWayMerge {
    type Item = OrderedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((_, index)) = self.heap.pop()?;
        let event = self.sources[index]
            .pop_front()
            .expect("heap entry without a source row");
        if let Some(next) = self.sources[index].front() {
            self.heap.push(Reverse((next.key, index)));
        }
        Some(event)
    }
}
