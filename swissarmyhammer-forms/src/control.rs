//! The runtime control tree.
//!
//! A [`ControlNode`] is a cheap handle onto shared state. Parents own their
//! children; children reach their parent through a `Weak` link that is only
//! used for root and ancestor lookup.
//!
//! Value writes validate before they notify, so a subscriber always observes
//! the control's status for the value it is handed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::reactive::{Observable, Subscription};
use crate::validation::{ValidationErrors, Validator, ValidatorOrigin, ValidatorSet};

/// Validation status of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlStatus {
    Valid,
    Invalid,
    Disabled,
}

/// Non-owning link from a child to its parent.
#[derive(Clone)]
enum ParentLink {
    Group(Weak<GroupInner>),
    Array(Weak<ArrayInner>),
}

impl ParentLink {
    fn upgrade(&self) -> Option<ControlNode> {
        match self {
            ParentLink::Group(weak) => weak
                .upgrade()
                .map(|inner| ControlNode::Group(GroupControl { inner })),
            ParentLink::Array(weak) => weak
                .upgrade()
                .map(|inner| ControlNode::Array(ArrayControl { inner })),
        }
    }
}

#[derive(Default)]
struct Parent(RefCell<Option<ParentLink>>);

impl Parent {
    fn get(&self) -> Option<ControlNode> {
        self.0.borrow().as_ref().and_then(ParentLink::upgrade)
    }

    fn set(&self, link: Option<ParentLink>) {
        *self.0.borrow_mut() = link;
    }
}

struct ScalarInner {
    name: RefCell<String>,
    value: Observable<Value>,
    disabled: Cell<bool>,
    dirty: Cell<bool>,
    touched: Cell<bool>,
    suppressed: Cell<bool>,
    validators: RefCell<ValidatorSet>,
    errors: RefCell<ValidationErrors>,
    external_errors: RefCell<ValidationErrors>,
    parent: Parent,
}

/// A leaf control holding one value.
#[derive(Clone)]
pub struct ScalarControl {
    inner: Rc<ScalarInner>,
}

impl ScalarControl {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let control = Self {
            inner: Rc::new(ScalarInner {
                name: RefCell::new(name.into()),
                value: Observable::new(value),
                disabled: Cell::new(false),
                dirty: Cell::new(false),
                touched: Cell::new(false),
                suppressed: Cell::new(false),
                validators: RefCell::new(ValidatorSet::new()),
                errors: RefCell::new(ValidationErrors::new()),
                external_errors: RefCell::new(ValidationErrors::new()),
                parent: Parent::default(),
            }),
        };
        control.validate();
        control
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    pub fn value(&self) -> Value {
        self.inner.value.get()
    }

    /// Programmatic write. Validates, then notifies subscribers if the value
    /// changed.
    pub fn set_value(&self, value: Value) {
        if !self.inner.value.replace(value) {
            return;
        }
        self.inner.external_errors.borrow_mut().clear();
        self.validate_with_ancestors();
        self.inner.value.notify();
    }

    /// A write coming from the user: also marks the control dirty.
    pub fn input(&self, value: Value) {
        self.inner.dirty.set(true);
        self.set_value(value);
    }

    /// Write without notifying subscribers. Validation still runs.
    pub fn restore_value(&self, value: Value) {
        if self.inner.value.replace(value) {
            self.inner.external_errors.borrow_mut().clear();
            self.validate_with_ancestors();
        }
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.value.subscribe(callback)
    }

    /// Subscribe at a fixed position in the notification order.
    pub fn subscribe_ordered(&self, order: u64, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.value.subscribe_ordered(order, callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.value.subscriber_count()
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    pub fn disable(&self) {
        if !self.inner.disabled.replace(true) {
            self.validate_with_ancestors();
        }
    }

    pub fn enable(&self) {
        if self.inner.disabled.replace(false) {
            self.validate_with_ancestors();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_touched(&self) -> bool {
        self.inner.touched.get()
    }

    pub fn mark_touched(&self) {
        self.inner.touched.set(true);
    }

    pub fn mark_pristine(&self) {
        self.inner.dirty.set(false);
        self.inner.touched.set(false);
    }

    pub fn status(&self) -> ControlStatus {
        if self.is_disabled() {
            ControlStatus::Disabled
        } else if self.inner.errors.borrow().is_empty() {
            ControlStatus::Valid
        } else {
            ControlStatus::Invalid
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status() != ControlStatus::Invalid
    }

    pub fn errors(&self) -> ValidationErrors {
        self.inner.errors.borrow().clone()
    }

    /// Replace the validators contributed by `origin` and revalidate.
    pub fn set_validators(&self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        self.inner.validators.borrow_mut().set(origin, validators);
        self.validate_with_ancestors();
    }

    /// Drop the validators contributed by `origin` and revalidate.
    pub fn remove_validators(&self, origin: ValidatorOrigin) {
        let removed = self.inner.validators.borrow_mut().remove(origin);
        if removed.is_some() {
            self.validate_with_ancestors();
        }
    }

    pub fn add_validators(&self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        self.inner.validators.borrow_mut().extend(origin, validators);
        self.validate_with_ancestors();
    }

    pub fn has_validators(&self, origin: ValidatorOrigin) -> bool {
        self.inner.validators.borrow().contains(origin)
    }

    pub fn validators(&self) -> Vec<Validator> {
        self.inner.validators.borrow().iter().cloned().collect()
    }

    /// Attach errors reported from outside, such as a server response.
    ///
    /// They are keyed `external.<n>`, mark the control touched and are
    /// dropped on the next value change.
    pub fn set_external_errors(&self, messages: Vec<String>) {
        {
            let mut external = self.inner.external_errors.borrow_mut();
            external.clear();
            for (index, message) in messages.into_iter().enumerate() {
                external.insert(format!("external.{index}"), message);
            }
        }
        self.mark_touched();
        self.validate_with_ancestors();
    }

    pub fn is_validation_suppressed(&self) -> bool {
        self.inner.suppressed.get()
    }

    /// Stop or resume reporting errors while keeping every validator.
    ///
    /// Hidden fields are suppressed so that validators added by other
    /// dependencies cannot block the form.
    pub fn suppress_validation(&self, suppressed: bool) {
        if self.inner.suppressed.replace(suppressed) != suppressed {
            self.validate_with_ancestors();
        }
    }

    /// Recompute this control's errors.
    pub fn validate(&self) {
        let errors = if self.is_disabled() || self.is_validation_suppressed() {
            ValidationErrors::new()
        } else {
            let value = self.value();
            let mut errors = self.inner.validators.borrow().run(&value);
            for (key, message) in self.inner.external_errors.borrow().iter() {
                errors.insert(key.clone(), message.clone());
            }
            errors
        };
        *self.inner.errors.borrow_mut() = errors;
    }

    fn validate_with_ancestors(&self) {
        self.node().validate_with_ancestors();
    }

    pub fn ptr_eq(&self, other: &ScalarControl) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn node(&self) -> ControlNode {
        ControlNode::Scalar(self.clone())
    }
}

impl fmt::Debug for ScalarControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarControl")
            .field("name", &self.name())
            .field("value", &self.value())
            .field("status", &self.status())
            .finish()
    }
}

struct GroupInner {
    name: RefCell<String>,
    children: RefCell<IndexMap<String, ControlNode>>,
    validators: RefCell<ValidatorSet>,
    errors: RefCell<ValidationErrors>,
    parent: Parent,
}

/// An ordered mapping of named child controls.
#[derive(Clone)]
pub struct GroupControl {
    inner: Rc<GroupInner>,
}

impl GroupControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                name: RefCell::new(name.into()),
                children: RefCell::new(IndexMap::new()),
                validators: RefCell::new(ValidatorSet::new()),
                errors: RefCell::new(ValidationErrors::new()),
                parent: Parent::default(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    fn rename(&self, name: String) {
        *self.inner.name.borrow_mut() = name;
    }

    pub fn get(&self, name: &str) -> Option<ControlNode> {
        self.inner.children.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.children.borrow().contains_key(name)
    }

    /// Children in declaration order.
    pub fn children(&self) -> Vec<ControlNode> {
        self.inner.children.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.children.borrow().is_empty()
    }

    /// Attach a child. Returns `false` and leaves the group untouched when
    /// the name is already taken.
    pub fn add_control(&self, child: ControlNode) -> bool {
        let name = child.name();
        if self.contains(&name) {
            return false;
        }
        child.set_parent(Some(ParentLink::Group(Rc::downgrade(&self.inner))));
        self.inner.children.borrow_mut().insert(name, child);
        self.validate_with_ancestors();
        true
    }

    /// Detach and return a child.
    pub fn remove_control(&self, name: &str) -> Option<ControlNode> {
        let removed = self.inner.children.borrow_mut().shift_remove(name);
        if let Some(child) = &removed {
            child.set_parent(None);
            self.validate_with_ancestors();
        }
        removed
    }

    /// Object of enabled children's values.
    pub fn value(&self) -> Value {
        let mut map = Map::new();
        for (name, child) in self.inner.children.borrow().iter() {
            if child.is_disabled() {
                continue;
            }
            map.insert(name.clone(), child.value());
        }
        Value::Object(map)
    }

    /// Object of every child's value, disabled ones included.
    pub fn raw_value(&self) -> Value {
        let map = self
            .inner
            .children
            .borrow()
            .iter()
            .map(|(name, child)| (name.clone(), child.raw_value()))
            .collect();
        Value::Object(map)
    }

    pub fn set_validators(&self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        self.inner.validators.borrow_mut().set(origin, validators);
        self.validate_with_ancestors();
    }

    pub fn errors(&self) -> ValidationErrors {
        self.inner.errors.borrow().clone()
    }

    /// Own errors are empty and every enabled descendant is valid.
    pub fn is_valid(&self) -> bool {
        self.inner.errors.borrow().is_empty() && self.children().iter().all(ControlNode::is_valid)
    }

    pub fn status(&self) -> ControlStatus {
        if self.is_valid() {
            ControlStatus::Valid
        } else {
            ControlStatus::Invalid
        }
    }

    pub fn validate(&self) {
        let errors = self.inner.validators.borrow().run(&self.value());
        *self.inner.errors.borrow_mut() = errors;
    }

    fn validate_with_ancestors(&self) {
        self.node().validate_with_ancestors();
    }

    /// Mark every scalar below this group as touched.
    pub fn mark_all_touched(&self) {
        for child in self.children() {
            child.mark_all_touched();
        }
    }

    pub fn ptr_eq(&self, other: &GroupControl) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn node(&self) -> ControlNode {
        ControlNode::Group(self.clone())
    }
}

impl fmt::Debug for GroupControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupControl")
            .field("name", &self.name())
            .field("children", &self.children())
            .finish()
    }
}

struct ArrayInner {
    name: RefCell<String>,
    items: RefCell<Vec<GroupControl>>,
    validators: RefCell<ValidatorSet>,
    errors: RefCell<ValidationErrors>,
    parent: Parent,
}

/// An ordered sequence of group items.
///
/// Items are named by their index and renamed when an earlier item is removed.
#[derive(Clone)]
pub struct ArrayControl {
    inner: Rc<ArrayInner>,
}

impl ArrayControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                name: RefCell::new(name.into()),
                items: RefCell::new(Vec::new()),
                validators: RefCell::new(ValidatorSet::new()),
                errors: RefCell::new(ValidationErrors::new()),
                parent: Parent::default(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    pub fn items(&self) -> Vec<GroupControl> {
        self.inner.items.borrow().clone()
    }

    pub fn item(&self, index: usize) -> Option<GroupControl> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Append an item and return its index.
    pub fn push(&self, item: GroupControl) -> usize {
        let index = self.len();
        item.rename(index.to_string());
        item.node()
            .set_parent(Some(ParentLink::Array(Rc::downgrade(&self.inner))));
        self.inner.items.borrow_mut().push(item);
        self.validate_with_ancestors();
        index
    }

    /// Detach the item at `index`, renaming the ones after it.
    pub fn remove_at(&self, index: usize) -> Option<GroupControl> {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            let removed = items.remove(index);
            for (i, item) in items.iter().enumerate().skip(index) {
                item.rename(i.to_string());
            }
            removed
        };
        removed.node().set_parent(None);
        self.validate_with_ancestors();
        Some(removed)
    }

    pub fn value(&self) -> Value {
        Value::Array(self.items().iter().map(GroupControl::value).collect())
    }

    pub fn raw_value(&self) -> Value {
        Value::Array(self.items().iter().map(GroupControl::raw_value).collect())
    }

    pub fn set_validators(&self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        self.inner.validators.borrow_mut().set(origin, validators);
        self.validate_with_ancestors();
    }

    pub fn errors(&self) -> ValidationErrors {
        self.inner.errors.borrow().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.inner.errors.borrow().is_empty() && self.items().iter().all(GroupControl::is_valid)
    }

    pub fn status(&self) -> ControlStatus {
        if self.is_valid() {
            ControlStatus::Valid
        } else {
            ControlStatus::Invalid
        }
    }

    pub fn validate(&self) {
        let errors = self.inner.validators.borrow().run(&self.value());
        *self.inner.errors.borrow_mut() = errors;
    }

    fn validate_with_ancestors(&self) {
        self.node().validate_with_ancestors();
    }

    pub fn ptr_eq(&self, other: &ArrayControl) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn node(&self) -> ControlNode {
        ControlNode::Array(self.clone())
    }
}

impl fmt::Debug for ArrayControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayControl")
            .field("name", &self.name())
            .field("items", &self.items())
            .finish()
    }
}

/// Any node of the control tree.
#[derive(Clone, Debug)]
pub enum ControlNode {
    Scalar(ScalarControl),
    Group(GroupControl),
    Array(ArrayControl),
}

impl ControlNode {
    pub fn name(&self) -> String {
        match self {
            ControlNode::Scalar(c) => c.name(),
            ControlNode::Group(c) => c.name(),
            ControlNode::Array(c) => c.name(),
        }
    }

    pub fn parent(&self) -> Option<ControlNode> {
        match self {
            ControlNode::Scalar(c) => c.inner.parent.get(),
            ControlNode::Group(c) => c.inner.parent.get(),
            ControlNode::Array(c) => c.inner.parent.get(),
        }
    }

    fn set_parent(&self, link: Option<ParentLink>) {
        match self {
            ControlNode::Scalar(c) => c.inner.parent.set(link),
            ControlNode::Group(c) => c.inner.parent.set(link),
            ControlNode::Array(c) => c.inner.parent.set(link),
        }
    }

    /// Direct children; array items appear as groups.
    pub fn children(&self) -> Vec<ControlNode> {
        match self {
            ControlNode::Scalar(_) => Vec::new(),
            ControlNode::Group(g) => g.children(),
            ControlNode::Array(a) => a.items().into_iter().map(ControlNode::Group).collect(),
        }
    }

    /// Child addressed by one path segment: a name for groups, a decimal
    /// index for arrays.
    pub fn child(&self, segment: &str) -> Option<ControlNode> {
        match self {
            ControlNode::Scalar(_) => None,
            ControlNode::Group(g) => g.get(segment),
            ControlNode::Array(a) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| a.item(i))
                .map(ControlNode::Group),
        }
    }

    /// Walk a path of segments from this node.
    pub fn at(&self, path: &[&str]) -> Option<ControlNode> {
        path.iter()
            .try_fold(self.clone(), |node, segment| node.child(segment))
    }

    pub fn value(&self) -> Value {
        match self {
            ControlNode::Scalar(c) => c.value(),
            ControlNode::Group(c) => c.value(),
            ControlNode::Array(c) => c.value(),
        }
    }

    pub fn raw_value(&self) -> Value {
        match self {
            ControlNode::Scalar(c) => c.value(),
            ControlNode::Group(c) => c.raw_value(),
            ControlNode::Array(c) => c.raw_value(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, ControlNode::Scalar(c) if c.is_disabled())
    }

    pub fn is_valid(&self) -> bool {
        match self {
            ControlNode::Scalar(c) => c.is_valid(),
            ControlNode::Group(c) => c.is_valid(),
            ControlNode::Array(c) => c.is_valid(),
        }
    }

    pub fn status(&self) -> ControlStatus {
        match self {
            ControlNode::Scalar(c) => c.status(),
            ControlNode::Group(c) => c.status(),
            ControlNode::Array(c) => c.status(),
        }
    }

    pub fn errors(&self) -> ValidationErrors {
        match self {
            ControlNode::Scalar(c) => c.errors(),
            ControlNode::Group(c) => c.errors(),
            ControlNode::Array(c) => c.errors(),
        }
    }

    pub fn set_validators(&self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        match self {
            ControlNode::Scalar(c) => c.set_validators(origin, validators),
            ControlNode::Group(c) => c.set_validators(origin, validators),
            ControlNode::Array(c) => c.set_validators(origin, validators),
        }
    }

    /// Recompute this node's own errors.
    pub fn validate(&self) {
        match self {
            ControlNode::Scalar(c) => c.validate(),
            ControlNode::Group(c) => c.validate(),
            ControlNode::Array(c) => c.validate(),
        }
    }

    /// Recompute every node's errors below and including this one.
    pub fn validate_tree(&self) {
        for child in self.children() {
            child.validate_tree();
        }
        self.validate();
    }

    fn validate_with_ancestors(&self) {
        self.validate();
        let mut parent = self.parent();
        while let Some(node) = parent {
            node.validate();
            parent = node.parent();
        }
    }

    pub fn mark_all_touched(&self) {
        match self {
            ControlNode::Scalar(c) => c.mark_touched(),
            other => other.children().iter().for_each(ControlNode::mark_all_touched),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarControl> {
        match self {
            ControlNode::Scalar(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupControl> {
        match self {
            ControlNode::Group(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayControl> {
        match self {
            ControlNode::Array(c) => Some(c),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &ControlNode) -> bool {
        match (self, other) {
            (ControlNode::Scalar(a), ControlNode::Scalar(b)) => a.ptr_eq(b),
            (ControlNode::Group(a), ControlNode::Group(b)) => a.ptr_eq(b),
            (ControlNode::Array(a), ControlNode::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<ScalarControl> for ControlNode {
    fn from(control: ScalarControl) -> Self {
        ControlNode::Scalar(control)
    }
}

impl From<GroupControl> for ControlNode {
    fn from(control: GroupControl) -> Self {
        ControlNode::Group(control)
    }
}

impl From<ArrayControl> for ControlNode {
    fn from(control: ArrayControl) -> Self {
        ControlNode::Array(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> (GroupControl, ScalarControl, ScalarControl) {
        let root = GroupControl::new("root");
        let name = ScalarControl::new("name", json!("Ada"));
        let age = ScalarControl::new("age", json!(36));
        root.add_control(name.clone().into());
        root.add_control(age.clone().into());
        (root, name, age)
    }

    #[test]
    fn disabled_values_are_raw_only() {
        let (root, _name, age) = person();
        age.disable();
        assert_eq!(root.value(), json!({ "name": "Ada" }));
        assert_eq!(root.raw_value(), json!({ "name": "Ada", "age": 36 }));
        assert_eq!(age.status(), ControlStatus::Disabled);
    }

    #[test]
    fn duplicate_child_is_ignored() {
        let (root, name, _) = person();
        assert!(!root.add_control(ScalarControl::new("name", json!("other")).into()));
        assert_eq!(root.len(), 2);
        assert!(root.get("name").unwrap().as_scalar().unwrap().ptr_eq(&name));
    }

    #[test]
    fn validation_bubbles_to_ancestors() {
        let (root, name, _) = person();
        name.set_validators(ValidatorOrigin::Static, vec![Validator::Required]);
        assert!(root.is_valid());
        name.set_value(json!(""));
        assert!(!root.is_valid());
        assert!(name.errors().contains_key("required"));
        name.disable();
        assert!(root.is_valid());
    }

    #[test]
    fn suppressed_validation_keeps_validators() {
        let (root, name, _) = person();
        name.set_validators(ValidatorOrigin::Manual, vec![Validator::Required]);
        name.set_value(Value::Null);
        assert!(!root.is_valid());

        name.suppress_validation(true);
        assert!(name.errors().is_empty());
        assert!(root.is_valid());
        assert_eq!(name.validators(), vec![Validator::Required]);

        name.suppress_validation(false);
        assert!(name.errors().contains_key("required"));
        assert!(!root.is_valid());
    }

    #[test]
    fn group_validators_see_group_value() {
        let (root, name, _) = person();
        root.set_validators(
            ValidatorOrigin::Static,
            vec![Validator::custom("ada", |v| {
                if v["name"] == json!("Ada") {
                    Ok(())
                } else {
                    Err("name must be Ada".into())
                }
            })],
        );
        assert!(root.is_valid());
        name.set_value(json!("Grace"));
        assert!(root.errors().contains_key("ada"));
    }

    #[test]
    fn set_value_validates_before_notifying() {
        let (_, name, _) = person();
        name.set_validators(ValidatorOrigin::Static, vec![Validator::Required]);
        let seen = Rc::new(Cell::new(None));
        let s = Rc::clone(&seen);
        let handle = name.clone();
        let _sub = name.subscribe(move |_| s.set(Some(handle.status())));
        name.set_value(json!(null));
        assert_eq!(seen.get(), Some(ControlStatus::Invalid));
    }

    #[test]
    fn restore_value_is_silent() {
        let (_, name, _) = person();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = name.subscribe(move |_| h.set(h.get() + 1));
        name.restore_value(json!("Grace"));
        assert_eq!(name.value(), json!("Grace"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn input_marks_dirty() {
        let (_, name, _) = person();
        assert!(!name.is_dirty());
        name.input(json!("Grace"));
        assert!(name.is_dirty());
        name.mark_pristine();
        assert!(!name.is_dirty());
    }

    #[test]
    fn external_errors_clear_on_change() {
        let (_, name, _) = person();
        name.set_external_errors(vec!["taken".into()]);
        assert!(name.is_touched());
        assert_eq!(
            name.errors().get("external.0").map(String::as_str),
            Some("taken")
        );
        name.set_value(json!("Grace"));
        assert!(name.errors().is_empty());
    }

    #[test]
    fn array_items_are_renamed_on_removal() {
        let array = ArrayControl::new("contacts");
        for email in ["a@x.io", "b@x.io", "c@x.io"] {
            let item = GroupControl::new("item");
            item.add_control(ScalarControl::new("email", json!(email)).into());
            array.push(item);
        }
        let removed = array.remove_at(0).unwrap();
        assert!(ControlNode::Group(removed).parent().is_none());
        assert_eq!(array.len(), 2);
        assert_eq!(array.item(0).unwrap().name(), "0");
        assert_eq!(array.item(1).unwrap().name(), "1");
        assert_eq!(
            array.value(),
            json!([{ "email": "b@x.io" }, { "email": "c@x.io" }])
        );
        assert!(array.remove_at(5).is_none());
    }

    #[test]
    fn path_navigation() {
        let root = GroupControl::new("root");
        let contacts = ArrayControl::new("contacts");
        let item = GroupControl::new("item");
        let email = ScalarControl::new("email", json!("a@x.io"));
        item.add_control(email.clone().into());
        contacts.push(item);
        root.add_control(contacts.into());

        let node = ControlNode::Group(root.clone());
        let found = node.at(&["contacts", "0", "email"]).unwrap();
        assert!(found.as_scalar().unwrap().ptr_eq(&email));
        assert!(node.at(&["contacts", "1", "email"]).is_none());
        assert!(node.at(&["contacts", "x"]).is_none());

        let parent = found.parent().unwrap();
        assert_eq!(parent.name(), "0");
        assert_eq!(parent.parent().unwrap().name(), "contacts");
    }
}
