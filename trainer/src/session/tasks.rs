use std::collections::HashMap;

use tokio::task::JoinHandle;

/// The session's deferred work slots. One task per kind at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    EngineReply,
    AutoOpen,
    HintLookup,
    HintExpiry,
    QualityExpiry,
    TopMoves,
}

/// Registry of abortable deferred tasks. Replacing a slot aborts its
/// previous occupant; draining aborts everything, which every
/// reset-like transition (new game, undo, game over, disable) does
/// before touching state.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskKind, JoinHandle<()>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: TaskKind, handle: JoinHandle<()>) {
        if let Some(old) = self.tasks.insert(kind, handle) {
            old.abort();
        }
    }

    pub fn cancel(&mut self, kind: TaskKind) {
        if let Some(handle) = self.tasks.remove(&kind) {
            handle.abort();
        }
    }

    pub fn drain(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_replacing_a_slot_aborts_the_old_task() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut registry = TaskRegistry::new();

        let flag = fired.clone();
        registry.set(
            TaskKind::EngineReply,
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                flag.store(true, Ordering::SeqCst);
            }),
        );
        registry.set(TaskKind::EngineReply, tokio::spawn(async {}));
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drain_aborts_everything() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut registry = TaskRegistry::new();

        for kind in [TaskKind::AutoOpen, TaskKind::HintExpiry, TaskKind::TopMoves] {
            let flag = fired.clone();
            registry.set(
                kind,
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    flag.store(true, Ordering::SeqCst);
                }),
            );
        }
        assert_eq!(registry.len(), 3);

        registry.drain();
        assert_eq!(registry.len(), 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
