/// Process-wide, lazily-initialized registry of last-chance cleanup
/// callbacks run on fatal termination, per §9 design note ("Global
/// termination-handler registry... retained but scoped to a process-wide
/// lazily-initialized structure with explicit add/remove; handlers fire
/// under a lock in registration order").
use parking_lot::Mutex;
use std::sync::OnceLock;

type Handler = Box<dyn Fn() + Send + Sync>;

struct Registry {
    handlers: Vec<(u64, Handler)>,
    next_id: u64,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| {
        Mutex::new(Registry {
            handlers: Vec::new(),
            next_id: 1,
        })
    })
}

/// A token returned by [`register`]; pass it to [`deregister`] to remove
/// the handler. Deregistering a token twice, or one never registered, is a
/// no-op (idempotent per the design note).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerToken(u64);

/// Register a handler to run on fatal termination. Handlers fire in
/// registration order, under the registry's lock.
pub fn register(handler: impl Fn() + Send + Sync + 'static) -> HandlerToken {
    let mut reg = registry().lock();
    let id = reg.next_id;
    reg.next_id += 1;
    reg.handlers.push((id, Box::new(handler)));
    HandlerToken(id)
}

/// Remove a previously registered handler. Idempotent.
pub fn deregister(token: HandlerToken) {
    let mut reg = registry().lock();
    reg.handlers.retain(|(id, _)| *id != token.0);
}

/// Run every registered handler, in registration order, under the lock.
/// Called from the process's fatal-signal path; a command agent registers
/// one that issues `TerminateAll` + `Done` and waits up to 10s for it to
/// settle (§4.8 "Termination handler").
pub fn run_handlers() {
    let reg = registry().lock();
    for (_, handler) in reg.handlers.iter() {
        handler();
    }
}
