//! The Plan/State Store: an in-process, mutex-protected rendezvous
//! structure keyed by module-component URN. Producers (module handler
//! operations) publish a Plan or State exactly once per URN; consumers
//! (child handler operations on the same URN) await it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::instrument;

use crate::errors::InvariantViolation;
use crate::model::{Plan, ResourceAddress, ResourcePlan, ResourceState, State, Urn};

/// Whole-module operation currently in flight for a URN, published by the
/// module handler so the Child Handler's delete logic can disambiguate a
/// single-child removal from a whole-stack destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOperation {
    Create,
    Update,
    Delete,
    Read,
}

#[derive(Default)]
struct Slot {
    plan: Option<Plan>,
    state: Option<State>,
    operation: Option<ModuleOperation>,
    notify: Arc<Notify>,
}

/// Reads the wait timeout from `MODBRIDGE_WAIT_TIMEOUT` once per call;
/// absent or unparseable means wait indefinitely.
fn wait_timeout() -> Option<Duration> {
    std::env::var("MODBRIDGE_WAIT_TIMEOUT")
        .ok()
        .and_then(|raw| humantime_like_parse(&raw))
}

/// Minimal duration parser accepting plain seconds (`"30"`) or a
/// `"30s"`/`"2m"`/`"1h"` suffix, avoiding a dependency on a full
/// humantime-style crate for a single environment variable.
fn humantime_like_parse(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let (digits, unit) = raw.split_at(raw.len().saturating_sub(1));
    let value: u64 = digits.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

/// The Store. Cheap to clone (wraps an `Arc`'d mutex); share one instance
/// across the whole provider process.
#[derive(Clone, Default)]
pub struct PlanStateStore {
    slots: Arc<Mutex<HashMap<Urn, Slot>>>,
}

impl PlanStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, plan))]
    pub fn set_plan(&self, urn: &Urn, plan: Plan) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(urn.clone()).or_default();
        if slot.plan.is_some() {
            panic!(
                "{}",
                InvariantViolation::DoublePublish { kind: "plan", urn: urn.clone() }
            );
        }
        slot.plan = Some(plan);
        slot.notify.notify_waiters();
    }

    #[instrument(skip(self, state))]
    pub fn set_state(&self, urn: &Urn, state: State) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(urn.clone()).or_default();
        if slot.state.is_some() {
            panic!(
                "{}",
                InvariantViolation::DoublePublish { kind: "state", urn: urn.clone() }
            );
        }
        slot.state = Some(state);
        slot.notify.notify_waiters();
    }

    pub fn set_operation(&self, urn: &Urn, operation: ModuleOperation) {
        let mut slots = self.slots.lock();
        slots.entry(urn.clone()).or_default().operation = Some(operation);
    }

    pub fn operation(&self, urn: &Urn) -> Option<ModuleOperation> {
        self.slots.lock().get(urn).and_then(|s| s.operation)
    }

    pub async fn await_plan(&self, urn: &Urn) -> Plan {
        self.await_field(urn, |slot| slot.plan.clone()).await
    }

    pub async fn await_state(&self, urn: &Urn) -> State {
        self.await_field(urn, |slot| slot.state.clone()).await
    }

    async fn await_field<T>(&self, urn: &Urn, extract: impl Fn(&Slot) -> Option<T>) -> T {
        loop {
            let notify = {
                let mut slots = self.slots.lock();
                let slot = slots.entry(urn.clone()).or_default();
                if let Some(value) = extract(slot) {
                    return value;
                }
                slot.notify.clone()
            };
            let wait = notify.notified();
            match wait_timeout() {
                Some(duration) => {
                    if tokio::time::timeout(duration, wait).await.is_err() {
                        panic!("Store await timed out after {duration:?} waiting on {urn}");
                    }
                }
                None => wait.await,
            }
        }
    }

    pub fn find_plan(&self, urn: &Urn, addr: &ResourceAddress) -> Option<ResourcePlan> {
        self.slots
            .lock()
            .get(urn)
            .and_then(|slot| slot.plan.as_ref())
            .and_then(|plan| plan.find(addr))
            .cloned()
    }

    pub fn find_state(&self, urn: &Urn, addr: &ResourceAddress) -> Option<ResourceState> {
        self.slots
            .lock()
            .get(urn)
            .and_then(|slot| slot.state.as_ref())
            .and_then(|state| state.find(addr))
            .cloned()
    }

    pub fn forget(&self, urn: &Urn) {
        self.slots.lock().remove(urn);
    }

    /// Decide whether `addr` actually went away, per the Child Handler's
    /// Delete disambiguation rules.
    pub fn is_resource_deleted(&self, urn: &Urn, addr: &ResourceAddress) -> bool {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(urn) else {
            return true;
        };
        if let Some(plan) = &slot.plan {
            return match plan.find(addr) {
                Some(_) => true,
                None => slot.state.as_ref().map(|s| !s.contains(addr)).unwrap_or(true),
            };
        }
        if slot.operation == Some(ModuleOperation::Delete) {
            return match &slot.state {
                Some(state) if state.is_empty() => false,
                Some(state) => !state.contains(addr),
                None => true,
            };
        }
        true
    }
}

/// The drift-detection set: URNs whose last Read observed plan-level
/// drift during a refresh-only plan. Consulted (and cleared) by the next
/// Diff for that URN, which then reports changes even when inputs are
/// otherwise unchanged. Cheap to clone (wraps an `Arc`'d mutex); share
/// one instance across the whole provider process.
#[derive(Clone, Default)]
pub struct DriftSet {
    urns: Arc<Mutex<HashSet<Urn>>>,
}

impl DriftSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, urn: &Urn) {
        self.urns.lock().insert(urn.clone());
    }

    /// Consult and clear: true iff `urn` had drift recorded, removing the
    /// entry so a single recorded drift is only honored once.
    pub fn take(&self, urn: &Urn) -> bool {
        self.urns.lock().remove(urn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(s: &str) -> Urn {
        s.to_string()
    }

    fn addr(s: &str) -> ResourceAddress {
        ResourceAddress::new(s)
    }

    #[tokio::test]
    async fn await_plan_unblocks_after_set_plan() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        let store2 = store.clone();
        let u2 = u.clone();
        let handle = tokio::spawn(async move { store2.await_plan(&u2).await });
        tokio::task::yield_now().await;
        store.set_plan(&u, Plan::default());
        let plan = handle.await.unwrap();
        assert!(plan.resources.is_empty());
    }

    #[test]
    #[should_panic]
    fn double_publish_of_plan_panics() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        store.set_plan(&u, Plan::default());
        store.set_plan(&u, Plan::default());
    }

    #[test]
    fn is_resource_deleted_with_plan_entry_present_returns_true() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        let a = addr("module.m.res.this");
        let mut plan = Plan::default();
        plan.resources.insert(
            a.clone(),
            ResourcePlan {
                underlying_type: "res".into(),
                change: crate::model::ChangeKind::Replace,
                planned_attributes: crate::model::PropertyValue::Null,
            },
        );
        store.set_plan(&u, plan);
        assert!(store.is_resource_deleted(&u, &a));
    }

    #[test]
    fn is_resource_deleted_with_plan_but_absent_address_checks_state() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        let a = addr("module.m.res.this");
        store.set_plan(&u, Plan::default());
        store.set_state(&u, State::default());
        assert!(store.is_resource_deleted(&u, &a));
    }

    #[test]
    fn is_resource_deleted_no_plan_in_whole_module_destroy_with_invalid_state_returns_false() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        let a = addr("module.m.res.this");
        store.set_operation(&u, ModuleOperation::Delete);
        store.set_state(&u, State::default());
        assert!(!store.is_resource_deleted(&u, &a));
    }

    #[test]
    fn is_resource_deleted_no_plan_no_destroy_returns_true() {
        let store = PlanStateStore::new();
        let u = urn("urn:a");
        let a = addr("module.m.res.this");
        assert!(store.is_resource_deleted(&u, &a));
    }

    #[test]
    fn drift_set_take_consults_and_clears() {
        let drift = DriftSet::new();
        let u = urn("urn:a");
        assert!(!drift.take(&u));

        drift.record(&u);
        assert!(drift.take(&u));
        assert!(!drift.take(&u));
    }
}
