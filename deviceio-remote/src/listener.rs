use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, trace};

use crate::model::Command;

/// Error returned by a listener that could not handle a batch
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every batch of commands delivered by the long-poll channel.
///
/// Listeners run on the channel task, one after the other. A listener that
/// needs to do slow work should hand the commands off rather than block.
pub trait CommandListener: Send + Sync {
    fn on_commands(&self, commands: &[Command]) -> Result<(), ListenerError>;
}

impl<F> CommandListener for F
where
    F: Fn(&[Command]) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_commands(&self, commands: &[Command]) -> Result<(), ListenerError> {
        self(commands)
    }
}

/// The set of listeners interested in commands.
///
/// Listeners are identified by their `Arc`, registering the same one twice
/// has no effect. Registration may happen while a dispatch is running, the
/// dispatch keeps using the listeners that were registered when it started.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn CommandListener>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same(a: &Arc<dyn CommandListener>, b: &Arc<dyn CommandListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Returns false if it was already registered.
    pub fn add(&self, listener: Arc<dyn CommandListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| same(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister `listener`. Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn CommandListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !same(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand `commands` to every registered listener.
    ///
    /// A listener that fails, or panics, is logged and skipped, the others
    /// still get the batch. Returns how many listeners handled it.
    pub fn dispatch(&self, commands: &[Command]) -> usize {
        let snapshot = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut handled = 0;
        for (index, listener) in snapshot.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_commands(commands))) {
                Ok(Ok(())) => handled += 1,
                Ok(Err(e)) => error!(listener = index, "listener failed to handle commands: {e}"),
                Err(payload) => error!(
                    listener = index,
                    "listener panicked while handling commands: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }

        trace!(
            commands = commands.len(),
            listeners = snapshot.len(),
            handled,
            "dispatched"
        );
        handled
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counter() -> (Arc<dyn CommandListener>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: Arc<dyn CommandListener> = Arc::new(move |commands: &[Command]| -> Result<(), ListenerError> {
            c.fetch_add(commands.len(), Ordering::SeqCst);
            Ok(())
        });
        (listener, count)
    }

    fn batch() -> Vec<Command> {
        vec![Command::new("a", 1, "set"), Command::new("b", 2, "get")]
    }

    #[test]
    fn it_ignores_duplicate_registrations() {
        let registry = ListenerRegistry::new();
        let (listener, count) = counter();

        assert!(registry.add(Arc::clone(&listener)));
        assert!(!registry.add(Arc::clone(&listener)));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.dispatch(&batch()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn it_stops_delivering_after_removal() {
        let registry = ListenerRegistry::new();
        let (listener, count) = counter();
        let (other, _) = counter();

        registry.add(Arc::clone(&listener));
        assert!(!registry.remove(&other));
        assert!(registry.remove(&listener));
        assert!(!registry.remove(&listener));
        assert!(registry.is_empty());

        assert_eq!(registry.dispatch(&batch()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn it_delivers_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            registry.add(Arc::new(move |commands: &[Command]| -> Result<(), ListenerError> {
                seen.lock().unwrap().push((name, commands.len()));
                Ok(())
            }));
        }

        assert_eq!(registry.dispatch(&batch()), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 2), ("second", 2), ("third", 2)]
        );
    }

    #[test]
    fn a_failing_listener_does_not_affect_the_others() {
        let registry = ListenerRegistry::new();
        let (before, before_count) = counter();
        let (after, after_count) = counter();

        registry.add(before);
        registry.add(Arc::new(|_: &[Command]| -> Result<(), ListenerError> {
            Err("device unreachable".into())
        }));
        registry.add(Arc::new(|_: &[Command]| -> Result<(), ListenerError> {
            panic!("listener bug")
        }));
        registry.add(after);

        assert_eq!(registry.dispatch(&batch()), 2);
        assert_eq!(before_count.load(Ordering::SeqCst), 2);
        assert_eq!(after_count.load(Ordering::SeqCst), 2);

        // the registry is still usable after a panic
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.dispatch(&batch()), 2);
    }

    #[test]
    fn listeners_can_register_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let (late, late_count) = counter();

        let r = Arc::clone(&registry);
        registry.add(Arc::new(move |_: &[Command]| -> Result<(), ListenerError> {
            r.add(Arc::clone(&late));
            Ok(())
        }));

        // the new listener only sees the next batch
        assert_eq!(registry.dispatch(&batch()), 1);
        assert_eq!(late_count.load(Ordering::SeqCst), 0);
        assert_eq!(registry.dispatch(&batch()), 2);
        assert_eq!(late_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registration_is_safe_from_many_threads() {
        let registry = Arc::new(ListenerRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let (listener, _) = counter();
                    for _ in 0..100 {
                        registry.add(Arc::clone(&listener));
                        registry.dispatch(&batch());
                        registry.remove(&listener);
                    }
                    registry.add(listener);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }
}
