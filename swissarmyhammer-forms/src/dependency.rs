//! Runtime dependencies between fields.
//!
//! A [`Dependency`] ties one [`DependencyDeclaration`] on a target field to
//! the source field it names. Its life cycle:
//!
//! ```text
//! Unbound --bind--> Subscribed <--source hidden/shown--> Suspended
//!    \                  |                                   |
//!     +-----------------+------------destroy----------------+--> Destroyed
//! ```
//!
//! While subscribed, every change of the source value re-evaluates the
//! predicate and applies the effect to the target. While the source field is
//! hidden the value subscription is dropped, so stale input on an invisible
//! field drives nothing. When the source is shown again the dependency
//! resubscribes and catches up with the source's current value.
//!
//! Cyclic dependency graphs are undefined behaviour: effects are applied
//! eagerly and a cycle may recurse without bound.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{FormsError, Result};
use crate::reactive::Subscription;
use crate::resolver::find_nearest;
use crate::schema::{ControlSchema, SchemaNode, WeakControlSchema};
use crate::types::{DependencyDeclaration, EffectKind};
use crate::validation::ValidatorOrigin;

static NEXT_DEPENDENCY_ID: AtomicU64 = AtomicU64::new(1);

/// Where a dependency is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Unbound,
    Subscribed,
    Suspended,
    Destroyed,
}

/// Why an evaluation is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// First evaluation when the dependency binds.
    Initial,
    /// The source value changed.
    Change,
    /// The source became visible again.
    CatchUp,
    /// One-shot pass after a bulk restore.
    Restore,
}

impl Trigger {
    /// Only source-driven re-evaluation may clear a hidden field's value.
    pub fn clears_hidden_value(self) -> bool {
        matches!(self, Trigger::Change | Trigger::CatchUp)
    }
}

struct DependencyInner {
    id: u64,
    declaration: DependencyDeclaration,
    target: WeakControlSchema,
    source: RefCell<Option<WeakControlSchema>>,
    state: Cell<DependencyState>,
    value_subscription: RefCell<Option<Subscription>>,
    visibility_subscription: RefCell<Option<Subscription>>,
    active: Cell<Option<bool>>,
}

/// A declared dependency attached to its target field.
#[derive(Clone)]
pub struct Dependency {
    inner: Rc<DependencyInner>,
}

impl Dependency {
    pub(crate) fn new(declaration: DependencyDeclaration, target: &ControlSchema) -> Self {
        Self {
            inner: Rc::new(DependencyInner {
                id: NEXT_DEPENDENCY_ID.fetch_add(1, Ordering::Relaxed),
                declaration,
                target: target.downgrade(),
                source: RefCell::new(None),
                state: Cell::new(DependencyState::Unbound),
                value_subscription: RefCell::new(None),
                visibility_subscription: RefCell::new(None),
                active: Cell::new(None),
            }),
        }
    }

    /// Process-unique id. Also the notification slot on the source, which
    /// keeps dependencies in declaration order.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn declaration(&self) -> &DependencyDeclaration {
        &self.inner.declaration
    }

    pub fn state(&self) -> DependencyState {
        self.inner.state.get()
    }

    /// Predicate result of the most recent evaluation.
    pub fn is_active(&self) -> Option<bool> {
        self.inner.active.get()
    }

    pub fn target(&self) -> Option<ControlSchema> {
        self.inner.target.upgrade()
    }

    pub fn source(&self) -> Option<ControlSchema> {
        self.inner
            .source
            .borrow()
            .as_ref()
            .and_then(WeakControlSchema::upgrade)
    }

    fn weak(&self) -> Weak<DependencyInner> {
        Rc::downgrade(&self.inner)
    }

    fn from_weak(weak: &Weak<DependencyInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Find the source field by name, searching outward from the target.
    fn resolve(&self, target: &ControlSchema) -> Result<ControlSchema> {
        if let Some(source) = self.source() {
            return Ok(source);
        }
        let name = &self.inner.declaration.source;
        let found = find_nearest(name, &SchemaNode::Control(target.clone())).ok_or_else(|| {
            FormsError::SourceNotFound {
                target: target.path(),
                source_field: name.clone(),
            }
        })?;
        let source = match found {
            SchemaNode::Control(source) => source,
            SchemaNode::Group(_) => {
                return Err(FormsError::SourceNotScalar {
                    target: target.path(),
                    source_field: name.clone(),
                })
            }
        };
        *self.inner.source.borrow_mut() = Some(source.downgrade());
        Ok(source)
    }

    /// Resolve the source and start observing it.
    ///
    /// The effect is applied right away with the source's current value. A
    /// hidden source still gets that first evaluation, but the dependency
    /// starts out suspended and ignores later changes. Binding twice is a no-op; binding a destroyed dependency
    /// does nothing.
    pub fn bind(&self) -> Result<()> {
        if self.state() != DependencyState::Unbound {
            return Ok(());
        }
        let Some(target) = self.target() else {
            return Ok(());
        };
        let source = self.resolve(&target)?;

        let weak = self.weak();
        let visibility = source.subscribe_hidden(move |hidden| {
            if let Some(dependency) = Dependency::from_weak(&weak) {
                if *hidden {
                    dependency.suspend();
                } else {
                    dependency.resume();
                }
            }
        });
        *self.inner.visibility_subscription.borrow_mut() = Some(visibility);

        if source.is_hidden() {
            self.inner.state.set(DependencyState::Suspended);
            debug!(
                field = %target.path(),
                source = %source.path(),
                effect = %self.inner.declaration.effect,
                "dependency bound while source hidden"
            );
        } else {
            self.subscribe_value(&source);
            self.inner.state.set(DependencyState::Subscribed);
            debug!(
                field = %target.path(),
                source = %source.path(),
                effect = %self.inner.declaration.effect,
                "dependency bound"
            );
        }
        self.evaluate(&source.control().value(), Trigger::Initial);
        Ok(())
    }

    fn subscribe_value(&self, source: &ControlSchema) {
        let weak = self.weak();
        let subscription = source.control().subscribe_ordered(self.inner.id, move |value| {
            if let Some(dependency) = Dependency::from_weak(&weak) {
                dependency.evaluate(value, Trigger::Change);
            }
        });
        *self.inner.value_subscription.borrow_mut() = Some(subscription);
    }

    fn cancel_value_subscription(&self) {
        let subscription = self.inner.value_subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    fn suspend(&self) {
        if self.state() != DependencyState::Subscribed {
            return;
        }
        self.cancel_value_subscription();
        self.inner.state.set(DependencyState::Suspended);
        debug!(dependency = self.inner.id, source = %self.inner.declaration.source, "dependency suspended");
    }

    fn resume(&self) {
        if self.state() != DependencyState::Suspended {
            return;
        }
        let Some(source) = self.source() else {
            return;
        };
        self.subscribe_value(&source);
        self.inner.state.set(DependencyState::Subscribed);
        debug!(dependency = self.inner.id, source = %self.inner.declaration.source, "dependency resumed");
        self.evaluate(&source.control().value(), Trigger::CatchUp);
    }

    /// Apply the effect once with the source's current value.
    ///
    /// Needs no subscription and leaves any existing one alone. Never clears
    /// the target's value, so running it twice yields the same state.
    pub fn run_once(&self) -> Result<()> {
        if self.state() == DependencyState::Destroyed {
            return Ok(());
        }
        let Some(target) = self.target() else {
            return Ok(());
        };
        let source = self.resolve(&target)?;
        self.evaluate(&source.control().value(), Trigger::Restore);
        Ok(())
    }

    /// Forget the resolved source and cancel every subscription, going back
    /// to `Unbound`. The next `bind` or `run_once` resolves the source again.
    pub(crate) fn unbind(&self) {
        if self.state() == DependencyState::Destroyed {
            return;
        }
        self.cancel_value_subscription();
        let visibility = self.inner.visibility_subscription.borrow_mut().take();
        if let Some(visibility) = visibility {
            visibility.cancel();
        }
        *self.inner.source.borrow_mut() = None;
        self.inner.state.set(DependencyState::Unbound);
        debug!(dependency = self.inner.id, source = %self.inner.declaration.source, "dependency unbound");
    }

    /// Cancel every subscription. Terminal and idempotent.
    pub fn destroy(&self) {
        if self.state() == DependencyState::Destroyed {
            return;
        }
        self.cancel_value_subscription();
        let visibility = self.inner.visibility_subscription.borrow_mut().take();
        if let Some(visibility) = visibility {
            visibility.cancel();
        }
        self.inner.state.set(DependencyState::Destroyed);
        debug!(dependency = self.inner.id, source = %self.inner.declaration.source, "dependency destroyed");
    }

    fn evaluate(&self, value: &Value, trigger: Trigger) {
        if self.state() == DependencyState::Destroyed {
            return;
        }
        let Some(target) = self.target() else {
            return;
        };
        let root = target.root();
        let trigger = match (trigger, root.as_group()) {
            (Trigger::CatchUp, Some(group)) if group.is_restoring() => Trigger::Restore,
            _ => trigger,
        };
        let on = self
            .inner
            .declaration
            .when
            .evaluate(value, || root.control().raw_value());
        self.inner.active.set(Some(on));
        apply_effect(self.inner.id, &self.inner.declaration, &target, on, trigger);
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.inner.id)
            .field("effect", &self.inner.declaration.effect)
            .field("source", &self.inner.declaration.source)
            .field("state", &self.state())
            .finish()
    }
}

/// Apply one effect axis to `target`.
pub fn apply_effect(
    dependency_id: u64,
    declaration: &DependencyDeclaration,
    target: &ControlSchema,
    on: bool,
    trigger: Trigger,
) {
    trace!(
        field = %target.path(),
        effect = %declaration.effect,
        on,
        ?trigger,
        "applying dependency effect"
    );
    let control = target.control();
    match declaration.effect {
        EffectKind::Hide if on => {
            control.remove_validators(ValidatorOrigin::Static);
            control.suppress_validation(true);
            if trigger.clears_hidden_value() {
                control.set_value(Value::Null);
            }
            target.set_hidden(true);
        }
        EffectKind::Hide => {
            control.set_validators(ValidatorOrigin::Static, target.static_validators());
            control.suppress_validation(false);
            target.set_hidden(false);
        }
        EffectKind::Disable if on => control.disable(),
        EffectKind::Disable => control.enable(),
        EffectKind::Readonly => target.set_readonly(on),
        EffectKind::AddValidators if on => control.set_validators(
            ValidatorOrigin::Dependency(dependency_id),
            declaration.validators.clone(),
        ),
        EffectKind::AddValidators => {
            control.remove_validators(ValidatorOrigin::Dependency(dependency_id))
        }
    }
}
