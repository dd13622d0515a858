//! Signal bus (C1).
//!
//! Named broadcast lines ("IRQs" in the literature this core is drawn from,
//! not CPU interrupts) that carry a 32-bit value between components. A
//! signal can chain to a downstream signal, invert its value, or filter
//! same-value re-raises so only edges propagate. Ownership lives in the
//! `SignalPool`: handles (`SignalId`) are stable indices into the pool's
//! backing storage, so components hold a small `Copy` handle rather than a
//! borrowed reference.

use std::collections::HashSet;

/// Opaque, stable handle to a signal owned by a `SignalPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(usize);

/// A notify hook: a callback identified by a small integer key plus a
/// caller-supplied parameter, invoked with the post-inversion value.
pub type NotifyFn = fn(param: u32, signal: SignalId, value: u32);

#[derive(Debug)]
struct Hook {
    notify: Option<(NotifyFn, u32)>,
    downstream: Option<SignalId>,
    /// Set while this hook's notify/re-raise is executing, to break direct
    /// A-raises-B-raises-A cycles.
    active: bool,
}

#[derive(Debug)]
struct Signal {
    name: String,
    value: u32,
    inverted: bool,
    filtered: bool,
    floating: bool,
    /// First raise has not happened yet, so a filtered signal cannot skip it.
    init: bool,
    hooks: Vec<Hook>,
}

/// Owns every signal allocated for one `Core`. Reallocating (a `Vec` under
/// the hood) but handles stay valid across growth since they are indices,
/// not pointers.
#[derive(Default, Debug)]
pub struct SignalPool {
    signals: Vec<Signal>,
}

impl SignalPool {
    pub fn new() -> Self {
        Self { signals: Vec::new() }
    }

    /// Allocate a new signal. Mirrors `alloc_irq`: the pool owns it for the
    /// lifetime of the core.
    pub fn alloc(&mut self, name: impl Into<String>) -> SignalId {
        self.alloc_with_flags(name, false, false)
    }

    pub fn alloc_with_flags(&mut self, name: impl Into<String>, inverted: bool, filtered: bool) -> SignalId {
        let id = SignalId(self.signals.len());
        self.signals.push(Signal {
            name: name.into(),
            value: 0,
            inverted,
            filtered,
            floating: false,
            init: true,
            hooks: Vec::new(),
        });
        id
    }

    pub fn name(&self, id: SignalId) -> &str {
        &self.signals[id.0].name
    }

    pub fn value(&self, id: SignalId) -> u32 {
        self.signals[id.0].value
    }

    pub fn is_floating(&self, id: SignalId) -> bool {
        self.signals[id.0].floating
    }

    /// `connect(src, dst)`: adds `dst` as a downstream of `src`, deduplicated.
    pub fn connect(&mut self, src: SignalId, dst: SignalId) {
        let sig = &mut self.signals[src.0];
        let already = sig.hooks.iter().any(|h| h.downstream == Some(dst));
        if !already {
            sig.hooks.push(Hook { notify: None, downstream: Some(dst), active: false });
        }
    }

    /// `disconnect(src, dst)`: removes a previously-established chain.
    pub fn disconnect(&mut self, src: SignalId, dst: SignalId) {
        let sig = &mut self.signals[src.0];
        sig.hooks.retain(|h| h.downstream != Some(dst));
    }

    /// `register_notify(signal, fn, param)`: adds a notify hook, deduplicated
    /// on the (function pointer, param) pair.
    pub fn register_notify(&mut self, id: SignalId, notify: NotifyFn, param: u32) {
        let sig = &mut self.signals[id.0];
        let already = sig.hooks.iter().any(|h| h.notify == Some((notify, param)));
        if !already {
            sig.hooks.push(Hook { notify: Some((notify, param)), downstream: None, active: false });
        }
    }

    pub fn unregister_notify(&mut self, id: SignalId, notify: NotifyFn, param: u32) {
        let sig = &mut self.signals[id.0];
        sig.hooks.retain(|h| h.notify != Some((notify, param)));
    }

    /// `raise(signal, value)`.
    pub fn raise(&mut self, id: SignalId, value: u32) {
        self.raise_float(id, value, false);
    }

    /// `raise_float(signal, value, floating)`.
    pub fn raise_float(&mut self, id: SignalId, value: u32, floating: bool) {
        let (filtered, prev, init, inverted, hook_count) = {
            let sig = &self.signals[id.0];
            (sig.filtered, sig.value, sig.init, sig.inverted, sig.hooks.len())
        };

        if filtered && !init && value == prev {
            return;
        }

        let delivered = if inverted { !value } else { value };

        for i in 0..hook_count {
            let already_active = self.signals[id.0].hooks[i].active;
            if already_active {
                continue;
            }
            self.signals[id.0].hooks[i].active = true;

            let notify = self.signals[id.0].hooks[i].notify;
            let downstream = self.signals[id.0].hooks[i].downstream;

            if let Some((f, param)) = notify {
                f(param, id, delivered);
            }
            if let Some(dst) = downstream {
                self.raise_float(dst, delivered, floating);
            }

            self.signals[id.0].hooks[i].active = false;
        }

        let sig = &mut self.signals[id.0];
        sig.value = delivered;
        sig.floating = floating;
        sig.init = false;
    }
}

/// Tracks which (pool-local) signal ids currently have an active reentry
/// guard; used by tests that want to assert no cycle escaped the guard.
pub fn active_hooks(pool: &SignalPool) -> HashSet<usize> {
    pool.signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.hooks.iter().any(|h| h.active))
        .map(|(i, _)| i)
        .collect()
}
