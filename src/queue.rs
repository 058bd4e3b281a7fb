//! The four scheduling queues.
//!
//! PCBs waiting to run live in one of four queues selected by their
//! `(state, suspended)` pair. The ready-class queues are ordered by
//! descending priority with FIFO among equal priorities; the blocked-class
//! queues are strict FIFO. A name index keeps lookup and removal from
//! scanning every queue, and guarantees a process is queued at most once.

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use hashbrown::HashMap;

use crate::pcb::{Pcb, State};

/// Identifies one of the four scheduling queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueId {
    Ready = 0,
    Blocked = 1,
    SuspendedReady = 2,
    SuspendedBlocked = 3,
}

impl QueueId {
    pub const ALL: [QueueId; 4] = [
        QueueId::Ready,
        QueueId::Blocked,
        QueueId::SuspendedReady,
        QueueId::SuspendedBlocked,
    ];

    /// The queue a PCB belongs in, or `None` for running processes, which
    /// are never queued.
    pub fn for_pcb(state: State, suspended: bool) -> Option<Self> {
        match (state, suspended) {
            (State::Ready, false) => Some(Self::Ready),
            (State::Blocked, false) => Some(Self::Blocked),
            (State::Ready, true) => Some(Self::SuspendedReady),
            (State::Blocked, true) => Some(Self::SuspendedBlocked),
            (State::Running, _) => None,
        }
    }

    /// Ready-class queues insert by priority; blocked-class queues append.
    fn priority_ordered(self) -> bool {
        matches!(self, Self::Ready | Self::SuspendedReady)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready Queue",
            Self::Blocked => "Blocked Queue",
            Self::SuspendedReady => "Suspended-Ready Queue",
            Self::SuspendedBlocked => "Suspended-Blocked Queue",
        }
    }
}

/// The queue set: four queues plus the process-name index.
///
/// The index maps every queued process name to the queue holding it, so
/// `find` and `remove` touch exactly one queue. Insert, pop, and remove keep
/// it consistent.
pub struct QueueSet {
    queues: [VecDeque<Pcb>; 4],
    index: HashMap<String, QueueId>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self {
            queues: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
            index: HashMap::new(),
        }
    }

    /// Routes a PCB into the queue matching its `(state, suspended)` pair.
    ///
    /// Ready-class insertion places the new PCB after the last one whose
    /// priority is greater than or equal to its own: strictly higher
    /// priority moves ahead, equal priority keeps arrival order.
    /// Blocked-class insertion appends at the tail.
    ///
    /// The PCB is handed back unchanged when it cannot be queued: its state
    /// is `Running`, or a process with the same name is already queued.
    pub fn insert(&mut self, pcb: Pcb) -> Result<(), Pcb> {
        let id = match QueueId::for_pcb(pcb.state, pcb.suspended) {
            Some(id) => id,
            None => return Err(pcb),
        };
        if self.index.contains_key(pcb.name()) {
            return Err(pcb);
        }

        let queue = &mut self.queues[id as usize];
        let pos = if id.priority_ordered() {
            queue
                .iter()
                .position(|queued| queued.priority() < pcb.priority())
                .unwrap_or(queue.len())
        } else {
            queue.len()
        };
        self.index.insert(pcb.name().to_string(), id);
        queue.insert(pos, pcb);
        Ok(())
    }

    /// Removes and returns the head of the given queue in O(1). For the
    /// ready-class queues that is the highest-priority, earliest-arrived
    /// PCB. Popping the last element leaves the queue empty.
    pub fn pop(&mut self, id: QueueId) -> Option<Pcb> {
        let pcb = self.queues[id as usize].pop_front()?;
        self.index.remove(pcb.name());
        Some(pcb)
    }

    /// Unlinks the named PCB from whichever queue holds it and returns it,
    /// or `None` if no queue holds a process with that name.
    pub fn remove(&mut self, name: &str) -> Option<Pcb> {
        let id = *self.index.get(name)?;
        let queue = &mut self.queues[id as usize];
        let pos = queue.iter().position(|pcb| pcb.name() == name)?;
        self.index.remove(name);
        queue.remove(pos)
    }

    /// Looks up the named PCB without removing it.
    pub fn find(&self, name: &str) -> Option<&Pcb> {
        let id = *self.index.get(name)?;
        self.queues[id as usize].iter().find(|pcb| pcb.name() == name)
    }

    /// The queue currently holding the named PCB, if any.
    pub fn queue_of(&self, name: &str) -> Option<QueueId> {
        self.index.get(name).copied()
    }

    pub fn len(&self, id: QueueId) -> usize {
        self.queues[id as usize].len()
    }

    pub fn is_empty(&self, id: QueueId) -> bool {
        self.queues[id as usize].is_empty()
    }

    /// Total PCBs across all four queues.
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Iterates a queue head-to-tail, for display and inspection.
    pub fn iter(&self, id: QueueId) -> impl Iterator<Item = &Pcb> {
        self.queues[id as usize].iter()
    }
}

impl Default for QueueSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcb::ProcessClass;

    fn ready(name: &str, priority: u8) -> Pcb {
        Pcb::new(name, ProcessClass::Application, priority).unwrap()
    }

    fn blocked(name: &str, priority: u8) -> Pcb {
        let mut pcb = ready(name, priority);
        pcb.state = State::Blocked;
        pcb
    }

    #[test]
    fn ready_pops_by_priority_then_arrival() {
        let mut set = QueueSet::new();
        for (name, priority) in [("a", 3), ("b", 7), ("c", 3), ("d", 9)] {
            set.insert(ready(name, priority)).unwrap();
        }

        let order: alloc::vec::Vec<_> = core::iter::from_fn(|| set.pop(QueueId::Ready))
            .map(|p| (p.name().to_string(), p.priority()))
            .collect();
        let order: alloc::vec::Vec<_> = order
            .iter()
            .map(|(n, p)| (n.as_str(), *p))
            .collect();
        assert_eq!(order, [("d", 9), ("b", 7), ("a", 3), ("c", 3)]);
    }

    #[test]
    fn equal_priority_head_keeps_arrival_order() {
        // A new PCB with priority equal to the head must go behind it, never
        // become the new head.
        let mut set = QueueSet::new();
        set.insert(ready("first", 5)).unwrap();
        set.insert(ready("second", 5)).unwrap();
        assert_eq!(set.pop(QueueId::Ready).unwrap().name(), "first");
        assert_eq!(set.pop(QueueId::Ready).unwrap().name(), "second");
    }

    #[test]
    fn blocked_queues_are_fifo_regardless_of_priority() {
        let mut set = QueueSet::new();
        set.insert(blocked("low", 1)).unwrap();
        set.insert(blocked("high", 9)).unwrap();
        assert_eq!(set.pop(QueueId::Blocked).unwrap().name(), "low");
        assert_eq!(set.pop(QueueId::Blocked).unwrap().name(), "high");
    }

    #[test]
    fn routes_by_state_and_suspension() {
        let mut set = QueueSet::new();
        let mut sr = ready("sr", 1);
        sr.suspended = true;
        let mut sb = blocked("sb", 1);
        sb.suspended = true;
        set.insert(ready("r", 1)).unwrap();
        set.insert(blocked("b", 1)).unwrap();
        set.insert(sr).unwrap();
        set.insert(sb).unwrap();

        assert_eq!(set.queue_of("r"), Some(QueueId::Ready));
        assert_eq!(set.queue_of("b"), Some(QueueId::Blocked));
        assert_eq!(set.queue_of("sr"), Some(QueueId::SuspendedReady));
        assert_eq!(set.queue_of("sb"), Some(QueueId::SuspendedBlocked));
    }

    #[test]
    fn running_pcb_is_rejected() {
        let mut set = QueueSet::new();
        let mut pcb = ready("run", 1);
        pcb.state = State::Running;
        let back = set.insert(pcb).unwrap_err();
        assert_eq!(back.name(), "run");
        assert_eq!(set.total_len(), 0);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut set = QueueSet::new();
        set.insert(ready("p", 1)).unwrap();
        assert!(set.insert(ready("p", 2)).is_err());
        assert_eq!(set.total_len(), 1);
    }

    #[test]
    fn popping_last_element_leaves_queue_empty() {
        let mut set = QueueSet::new();
        set.insert(ready("only", 4)).unwrap();
        assert_eq!(set.pop(QueueId::Ready).unwrap().name(), "only");
        assert!(set.is_empty(QueueId::Ready));
        assert_eq!(set.pop(QueueId::Ready).map(|p| p.name().to_string()), None);
    }

    #[test]
    fn find_matches_in_at_most_one_queue() {
        let mut set = QueueSet::new();
        set.insert(ready("a", 2)).unwrap();
        set.insert(blocked("b", 2)).unwrap();

        let hits = QueueId::ALL
            .iter()
            .filter(|&&id| set.iter(id).any(|p| p.name() == "a"))
            .count();
        assert_eq!(hits, 1);
        assert!(set.find("a").is_some());
        assert!(set.find("missing").is_none());
    }

    #[test]
    fn queued_count_tracks_inserts_minus_removes() {
        let mut set = QueueSet::new();
        for i in 0..5u8 {
            let name = alloc::format!("p{i}");
            set.insert(ready(&name, i)).unwrap();
        }
        assert_eq!(set.total_len(), 5);
        assert!(set.remove("p3").is_some());
        assert!(set.remove("p3").is_none());
        assert_eq!(set.total_len(), 4);
        set.pop(QueueId::Ready);
        assert_eq!(set.total_len(), 3);
    }

    #[test]
    fn remove_then_reinsert_moves_between_queues() {
        let mut set = QueueSet::new();
        set.insert(ready("p", 6)).unwrap();
        let mut pcb = set.remove("p").unwrap();
        pcb.suspended = true;
        set.insert(pcb).unwrap();
        assert_eq!(set.queue_of("p"), Some(QueueId::SuspendedReady));
        assert_eq!(set.len(QueueId::Ready), 0);
    }
}
