//! The schema tree: per-field presentation state that mirrors the control
//! tree one to one.
//!
//! Leaves are [`ControlSchema`] nodes. They carry observable metadata,
//! the hidden/readonly flags driven by dependencies, and the dependencies
//! they own. Composites are [`GroupSchema`] nodes that own nothing but their
//! children.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::control::{ArrayControl, ControlNode, ControlStatus, GroupControl, ScalarControl};
use crate::dependency::Dependency;
use crate::error::{FormsError, Result};
use crate::reactive::{Observable, Subscription};
use crate::resolver::{find_root, TreeNode};
use crate::types::{DependencyDeclaration, FieldKind, FieldSchema, FieldType, SelectOption};
use crate::validation::{ValidationErrors, Validator, ValidatorOrigin};

/// Presentation metadata of a leaf field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FieldMeta {
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub field_type: FieldType,
    pub options: Vec<SelectOption>,
}

/// What a blur or select hook receives.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEvent {
    pub path: String,
    pub value: Value,
    pub status: ControlStatus,
}

type EventHook = Rc<dyn Fn(&FieldEvent)>;

/// Everything the rendering layer reads for one leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldState {
    pub path: String,
    pub name: String,
    pub value: Value,
    pub is_hidden: bool,
    pub is_readonly: bool,
    pub is_disabled: bool,
    pub label: Option<String>,
    pub field_type: FieldType,
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
    pub validation_errors: ValidationErrors,
    pub status: ControlStatus,
    pub dirty: bool,
    pub touched: bool,
}

struct ControlSchemaInner {
    name: String,
    control: ScalarControl,
    meta: Observable<FieldMeta>,
    hidden: Observable<bool>,
    readonly: Observable<bool>,
    static_validators: RefCell<Vec<Validator>>,
    dependencies: RefCell<Vec<Dependency>>,
    on_blur: RefCell<Vec<EventHook>>,
    on_select: RefCell<Vec<EventHook>>,
    parent: RefCell<Weak<GroupSchemaInner>>,
}

/// Schema node for a scalar control.
#[derive(Clone)]
pub struct ControlSchema {
    inner: Rc<ControlSchemaInner>,
}

/// Non-owning handle to a [`ControlSchema`].
#[derive(Clone)]
pub struct WeakControlSchema(Weak<ControlSchemaInner>);

impl WeakControlSchema {
    pub fn upgrade(&self) -> Option<ControlSchema> {
        self.0.upgrade().map(|inner| ControlSchema { inner })
    }
}

impl ControlSchema {
    /// A bare schema node for `control`, without metadata or dependencies.
    pub fn new(control: ScalarControl) -> Self {
        Self {
            inner: Rc::new(ControlSchemaInner {
                name: control.name(),
                control,
                meta: Observable::new(FieldMeta::default()),
                hidden: Observable::new(false),
                readonly: Observable::new(false),
                static_validators: RefCell::new(Vec::new()),
                dependencies: RefCell::new(Vec::new()),
                on_blur: RefCell::new(Vec::new()),
                on_select: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Build the node for a scalar field, applying its config.
    pub fn from_field(field: &FieldSchema, control: ScalarControl) -> Self {
        let schema = Self::new(control);
        let config = &field.config;
        schema.inner.meta.replace(FieldMeta {
            label: config.label.clone(),
            placeholder: config.placeholder.clone(),
            field_type: config.field_type,
            options: config.options.clone(),
        });
        *schema.inner.static_validators.borrow_mut() = config.validators.clone();
        for declaration in &config.dependencies {
            schema.add_dependency(declaration.clone());
        }
        schema
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn control(&self) -> &ScalarControl {
        &self.inner.control
    }

    pub fn parent(&self) -> Option<GroupSchema> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| GroupSchema { inner })
    }

    fn set_parent(&self, parent: Weak<GroupSchemaInner>) {
        *self.inner.parent.borrow_mut() = parent;
    }

    /// Dot-separated path from the root, array items by index.
    pub fn path(&self) -> String {
        SchemaNode::Control(self.clone()).path()
    }

    pub fn downgrade(&self) -> WeakControlSchema {
        WeakControlSchema(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &ControlSchema) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn meta(&self) -> FieldMeta {
        self.inner.meta.get()
    }

    pub fn subscribe_meta(&self, callback: impl Fn(&FieldMeta) + 'static) -> Subscription {
        self.inner.meta.subscribe(callback)
    }

    fn update_meta(&self, update: impl FnOnce(&mut FieldMeta)) -> &Self {
        let mut meta = self.meta();
        update(&mut meta);
        self.inner.meta.set(meta);
        self
    }

    pub fn set_label(&self, label: impl Into<String>) -> &Self {
        let label = label.into();
        self.update_meta(|meta| meta.label = Some(label))
    }

    pub fn set_placeholder(&self, placeholder: impl Into<String>) -> &Self {
        let placeholder = placeholder.into();
        self.update_meta(|meta| meta.placeholder = Some(placeholder))
    }

    pub fn set_field_type(&self, field_type: FieldType) -> &Self {
        self.update_meta(|meta| meta.field_type = field_type)
    }

    pub fn set_options(&self, options: Vec<SelectOption>) -> &Self {
        self.update_meta(|meta| meta.options = options)
    }

    /// Append static validators. They are active unless the field is hidden.
    pub fn add_validators(&self, validators: Vec<Validator>) -> &Self {
        self.inner
            .static_validators
            .borrow_mut()
            .extend(validators.iter().cloned());
        if !self.is_hidden() {
            self.control()
                .add_validators(ValidatorOrigin::Static, validators);
        }
        self
    }

    pub fn static_validators(&self) -> Vec<Validator> {
        self.inner.static_validators.borrow().clone()
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.get()
    }

    pub fn subscribe_hidden(&self, callback: impl Fn(&bool) + 'static) -> Subscription {
        self.inner.hidden.subscribe(callback)
    }

    pub(crate) fn set_hidden(&self, hidden: bool) {
        self.inner.hidden.set(hidden);
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly.get()
    }

    pub fn subscribe_readonly(&self, callback: impl Fn(&bool) + 'static) -> Subscription {
        self.inner.readonly.subscribe(callback)
    }

    pub(crate) fn set_readonly(&self, readonly: bool) {
        self.inner.readonly.set(readonly);
    }

    pub fn is_disabled(&self) -> bool {
        self.control().is_disabled()
    }

    /// Register a dependency owned by this field. It stays unbound until
    /// tracking starts or [`Dependency::bind`] is called.
    pub fn add_dependency(&self, declaration: DependencyDeclaration) -> Dependency {
        let dependency = Dependency::new(declaration, self);
        self.inner
            .dependencies
            .borrow_mut()
            .push(dependency.clone());
        dependency
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner.dependencies.borrow().clone()
    }

    /// Remove and return every owned dependency.
    pub(crate) fn take_dependencies(&self) -> Vec<Dependency> {
        std::mem::take(&mut *self.inner.dependencies.borrow_mut())
    }

    pub fn on_blur(&self, hook: impl Fn(&FieldEvent) + 'static) -> &Self {
        self.inner.on_blur.borrow_mut().push(Rc::new(hook));
        self
    }

    pub fn on_select(&self, hook: impl Fn(&FieldEvent) + 'static) -> &Self {
        self.inner.on_select.borrow_mut().push(Rc::new(hook));
        self
    }

    fn event(&self) -> FieldEvent {
        FieldEvent {
            path: self.path(),
            value: self.control().value(),
            status: self.control().status(),
        }
    }

    pub(crate) fn fire_blur(&self) {
        let hooks = self.inner.on_blur.borrow().clone();
        if hooks.is_empty() {
            return;
        }
        let event = self.event();
        hooks.iter().for_each(|hook| hook(&event));
    }

    pub(crate) fn fire_select(&self) {
        let hooks = self.inner.on_select.borrow().clone();
        if hooks.is_empty() {
            return;
        }
        let event = self.event();
        hooks.iter().for_each(|hook| hook(&event));
    }

    /// The root of the schema tree this field belongs to.
    pub fn root(&self) -> SchemaNode {
        find_root(&SchemaNode::Control(self.clone()))
    }

    pub fn state(&self) -> FieldState {
        let meta = self.meta();
        let control = self.control();
        FieldState {
            path: self.path(),
            name: self.name().to_string(),
            value: control.value(),
            is_hidden: self.is_hidden(),
            is_readonly: self.is_readonly(),
            is_disabled: control.is_disabled(),
            label: meta.label,
            field_type: meta.field_type,
            placeholder: meta.placeholder,
            options: meta.options,
            validation_errors: control.errors(),
            status: control.status(),
            dirty: control.is_dirty(),
            touched: control.is_touched(),
        }
    }

    fn debug_value(&self) -> Value {
        let meta = self.meta();
        let mut map = Map::new();
        map.insert("value".into(), self.control().value());
        map.insert("hidden".into(), Value::Bool(self.is_hidden()));
        map.insert("readonly".into(), Value::Bool(self.is_readonly()));
        map.insert("disabled".into(), Value::Bool(self.is_disabled()));
        map.insert(
            "field_type".into(),
            serde_json::to_value(meta.field_type).unwrap_or(Value::Null),
        );
        if let Some(label) = meta.label {
            map.insert("label".into(), Value::String(label));
        }
        Value::Object(map)
    }
}

impl fmt::Debug for ControlSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSchema")
            .field("name", &self.inner.name)
            .field("hidden", &self.is_hidden())
            .field("readonly", &self.is_readonly())
            .field("dependencies", &self.inner.dependencies.borrow().len())
            .finish()
    }
}

/// What a group node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// The form itself.
    Root,
    Object,
    Array,
    /// One element of an array.
    Item,
}

struct GroupSchemaInner {
    name: RefCell<String>,
    kind: GroupKind,
    control: ControlNode,
    children: RefCell<IndexMap<String, SchemaNode>>,
    item_fields: Vec<FieldSchema>,
    restoring: Cell<bool>,
    parent: RefCell<Weak<GroupSchemaInner>>,
}

/// Schema node for a group, an array or an array item.
#[derive(Clone)]
pub struct GroupSchema {
    inner: Rc<GroupSchemaInner>,
}

impl GroupSchema {
    fn with_control(name: String, kind: GroupKind, control: ControlNode, item_fields: Vec<FieldSchema>) -> Self {
        Self {
            inner: Rc::new(GroupSchemaInner {
                name: RefCell::new(name),
                kind,
                control,
                children: RefCell::new(IndexMap::new()),
                item_fields,
                restoring: Cell::new(false),
                parent: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Build the schema for an object-like group in lock-step with its
    /// already-built control, applying each field's config.
    pub fn from_fields(kind: GroupKind, control: &GroupControl, fields: &[FieldSchema]) -> Result<Self> {
        let schema = Self::with_control(
            control.name(),
            kind,
            ControlNode::Group(control.clone()),
            Vec::new(),
        );
        for field in fields {
            let child = control.get(&field.name).ok_or_else(|| FormsError::InvalidSchema {
                name: field.name.clone(),
                message: "control tree has no matching control".into(),
            })?;
            schema.add_child(SchemaNode::from_field(field, child)?);
        }
        Ok(schema)
    }

    /// Build the schema for an array field and each of its current items.
    pub fn from_array(control: &ArrayControl, item_fields: &[FieldSchema]) -> Result<Self> {
        let schema = Self::with_control(
            control.name(),
            GroupKind::Array,
            ControlNode::Array(control.clone()),
            item_fields.to_vec(),
        );
        for item in control.items() {
            schema.push_item(Self::from_fields(GroupKind::Item, &item, item_fields)?);
        }
        Ok(schema)
    }

    /// Mirror an existing control tree with bare schema nodes.
    ///
    /// Only groups and arrays can root a schema tree; a scalar at the top is
    /// rejected.
    pub fn mirror(control: &ControlNode) -> Result<Self> {
        Self::mirror_as(control, GroupKind::Root)
    }

    fn mirror_as(control: &ControlNode, kind: GroupKind) -> Result<Self> {
        match control {
            ControlNode::Group(group) => {
                let schema = Self::with_control(group.name(), kind, control.clone(), Vec::new());
                for child in group.children() {
                    schema.add_child(SchemaNode::mirror(&child)?);
                }
                Ok(schema)
            }
            ControlNode::Array(array) => {
                let kind = if kind == GroupKind::Root {
                    GroupKind::Root
                } else {
                    GroupKind::Array
                };
                let schema = Self::with_control(array.name(), kind, control.clone(), Vec::new());
                for item in array.items() {
                    let item = ControlNode::Group(item);
                    schema.add_child(SchemaNode::Group(Self::mirror_as(&item, GroupKind::Item)?));
                }
                Ok(schema)
            }
            ControlNode::Scalar(scalar) => Err(FormsError::UnsupportedControl {
                name: scalar.name(),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    fn rename(&self, name: String) {
        *self.inner.name.borrow_mut() = name;
    }

    pub fn kind(&self) -> GroupKind {
        self.inner.kind
    }

    pub fn is_array(&self) -> bool {
        matches!(self.inner.control, ControlNode::Array(_))
    }

    pub fn control(&self) -> &ControlNode {
        &self.inner.control
    }

    /// Field list used to build new items of an array node.
    pub fn item_fields(&self) -> &[FieldSchema] {
        &self.inner.item_fields
    }

    pub fn parent(&self) -> Option<GroupSchema> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| GroupSchema { inner })
    }

    fn set_parent(&self, parent: Weak<GroupSchemaInner>) {
        *self.inner.parent.borrow_mut() = parent;
    }

    pub fn ptr_eq(&self, other: &GroupSchema) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn children(&self) -> Vec<SchemaNode> {
        self.inner.children.borrow().values().cloned().collect()
    }

    pub fn child(&self, name: &str) -> Option<SchemaNode> {
        self.inner.children.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.children.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.children.borrow().is_empty()
    }

    /// Nested lookup by path segments: child names, and decimal indices
    /// inside arrays.
    pub fn get(&self, path: &[&str]) -> Option<SchemaNode> {
        path.iter()
            .try_fold(SchemaNode::Group(self.clone()), |node, segment| match node {
                SchemaNode::Group(group) => group.child(segment),
                SchemaNode::Control(_) => None,
            })
    }

    /// Like [`get`](Self::get), but the path must end at a leaf.
    pub fn field(&self, path: &[&str]) -> Option<ControlSchema> {
        match self.get(path)? {
            SchemaNode::Control(control) => Some(control),
            SchemaNode::Group(_) => None,
        }
    }

    pub(crate) fn add_child(&self, child: SchemaNode) {
        child.set_parent(Rc::downgrade(&self.inner));
        self.inner
            .children
            .borrow_mut()
            .insert(child.name(), child);
    }

    pub(crate) fn push_item(&self, item: GroupSchema) -> usize {
        let index = self.len();
        item.rename(index.to_string());
        self.add_child(SchemaNode::Group(item));
        index
    }

    /// Detach the item at `index` and rekey the ones after it.
    pub(crate) fn remove_item(&self, index: usize) -> Option<GroupSchema> {
        let mut children = self.inner.children.borrow_mut();
        if index >= children.len() {
            return None;
        }
        let (_, removed) = children.shift_remove_index(index)?;
        let rekeyed: IndexMap<String, SchemaNode> = children
            .drain(..)
            .enumerate()
            .map(|(i, (_, node))| {
                if let SchemaNode::Group(group) = &node {
                    group.rename(i.to_string());
                }
                (i.to_string(), node)
            })
            .collect();
        *children = rekeyed;
        drop(children);
        removed.set_parent(Weak::new());
        match removed {
            SchemaNode::Group(group) => Some(group),
            SchemaNode::Control(_) => None,
        }
    }

    /// Every leaf below this node, depth-first in declaration order.
    pub fn controls(&self) -> Vec<ControlSchema> {
        let mut out = Vec::new();
        collect_controls(&SchemaNode::Group(self.clone()), &mut out);
        out
    }

    pub(crate) fn set_restoring(&self, restoring: bool) {
        self.inner.restoring.set(restoring);
    }

    /// Whether a one-shot restore pass is running on this tree.
    pub fn is_restoring(&self) -> bool {
        self.inner.restoring.get()
    }

    /// Compact JSON rendering of the tree for logs and tooling.
    pub fn to_debug_value(&self) -> Value {
        if self.is_array() {
            return Value::Array(
                self.children()
                    .iter()
                    .map(SchemaNode::to_debug_value)
                    .collect(),
            );
        }
        let map = self
            .inner
            .children
            .borrow()
            .iter()
            .map(|(name, node)| (name.clone(), node.to_debug_value()))
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for GroupSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSchema")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("children", &self.children())
            .finish()
    }
}

fn collect_controls(node: &SchemaNode, out: &mut Vec<ControlSchema>) {
    match node {
        SchemaNode::Control(control) => out.push(control.clone()),
        SchemaNode::Group(group) => {
            for child in group.children() {
                collect_controls(&child, out);
            }
        }
    }
}

/// Any node of the schema tree.
#[derive(Clone, Debug)]
pub enum SchemaNode {
    Control(ControlSchema),
    Group(GroupSchema),
}

impl SchemaNode {
    /// Build the node for `field` around its already-built control.
    pub fn from_field(field: &FieldSchema, control: ControlNode) -> Result<Self> {
        match (field.kind, control) {
            (FieldKind::Scalar, ControlNode::Scalar(scalar)) => {
                Ok(SchemaNode::Control(ControlSchema::from_field(field, scalar)))
            }
            (FieldKind::Object, ControlNode::Group(group)) => Ok(SchemaNode::Group(
                GroupSchema::from_fields(GroupKind::Object, &group, field.children())?,
            )),
            (FieldKind::Array, ControlNode::Array(array)) => Ok(SchemaNode::Group(
                GroupSchema::from_array(&array, field.children())?,
            )),
            (kind, control) => Err(FormsError::InvalidSchema {
                name: field.name.clone(),
                message: format!(
                    "field kind {kind:?} does not match control '{}'",
                    control.name()
                ),
            }),
        }
    }

    /// Bare mirror of a control subtree.
    pub fn mirror(control: &ControlNode) -> Result<Self> {
        match control {
            ControlNode::Scalar(scalar) => Ok(SchemaNode::Control(ControlSchema::new(scalar.clone()))),
            ControlNode::Group(_) => Ok(SchemaNode::Group(GroupSchema::mirror_as(
                control,
                GroupKind::Object,
            )?)),
            ControlNode::Array(_) => Ok(SchemaNode::Group(GroupSchema::mirror_as(
                control,
                GroupKind::Array,
            )?)),
        }
    }

    pub fn name(&self) -> String {
        match self {
            SchemaNode::Control(c) => c.name().to_string(),
            SchemaNode::Group(g) => g.name(),
        }
    }

    pub fn parent(&self) -> Option<GroupSchema> {
        match self {
            SchemaNode::Control(c) => c.parent(),
            SchemaNode::Group(g) => g.parent(),
        }
    }

    fn set_parent(&self, parent: Weak<GroupSchemaInner>) {
        match self {
            SchemaNode::Control(c) => c.set_parent(parent),
            SchemaNode::Group(g) => g.set_parent(parent),
        }
    }

    pub fn control(&self) -> ControlNode {
        match self {
            SchemaNode::Control(c) => ControlNode::Scalar(c.control().clone()),
            SchemaNode::Group(g) => g.control().clone(),
        }
    }

    /// Dot-separated path from the root. The root's own name is not part of it.
    pub fn path(&self) -> String {
        let mut segments = vec![self.name()];
        let mut parent = self.parent();
        while let Some(group) = parent {
            let next = group.parent();
            if next.is_some() {
                segments.push(group.name());
            }
            parent = next;
        }
        if self.parent().is_none() {
            return String::new();
        }
        segments.reverse();
        segments.join(".")
    }

    pub fn as_control(&self) -> Option<&ControlSchema> {
        match self {
            SchemaNode::Control(c) => Some(c),
            SchemaNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupSchema> {
        match self {
            SchemaNode::Group(g) => Some(g),
            SchemaNode::Control(_) => None,
        }
    }

    pub fn to_debug_value(&self) -> Value {
        match self {
            SchemaNode::Control(c) => c.debug_value(),
            SchemaNode::Group(g) => g.to_debug_value(),
        }
    }

    pub fn ptr_eq(&self, other: &SchemaNode) -> bool {
        match (self, other) {
            (SchemaNode::Control(a), SchemaNode::Control(b)) => a.ptr_eq(b),
            (SchemaNode::Group(a), SchemaNode::Group(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl TreeNode for SchemaNode {
    fn node_name(&self) -> String {
        self.name()
    }

    fn parent_node(&self) -> Option<Self> {
        self.parent().map(SchemaNode::Group)
    }

    fn child_nodes(&self) -> Vec<Self> {
        match self {
            SchemaNode::Control(_) => Vec::new(),
            SchemaNode::Group(g) => g.children(),
        }
    }

    fn is_composite(&self) -> bool {
        matches!(self, SchemaNode::Group(_))
    }

    fn is_array(&self) -> bool {
        matches!(self, SchemaNode::Group(g) if g.is_array())
    }
}
