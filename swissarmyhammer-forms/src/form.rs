//! The form instance: owner of one control tree, its schema mirror and every
//! dependency between their fields.
//!
//! Paths are dot-separated field names; array items are addressed by index,
//! as in `contacts.0.email`.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::builder::{build_control, build_group, build_item};
use crate::control::{ArrayControl, ControlNode, GroupControl};
use crate::dependency::Dependency;
use crate::error::{FormsError, Result};
use crate::lifecycle;
use crate::schema::{ControlSchema, FieldState, GroupKind, GroupSchema, SchemaNode};
use crate::types::{validate_fields, DependencyDeclaration, FieldSchema, FormDefinition};
use crate::validation::ValidationErrors;

/// Split a dotted path into segments. The empty path names the root.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// A built form.
///
/// The owner must call [`destroy`](Form::destroy) when done; dropping the
/// form does the same.
pub struct Form {
    name: String,
    controls: GroupControl,
    schema: GroupSchema,
    tracking: bool,
    destroyed: bool,
}

impl Form {
    /// Build the control tree and its schema mirror. Dependencies are
    /// registered but not bound.
    pub fn build(name: &str, fields: &[FieldSchema], model: Option<&Value>) -> Result<Self> {
        validate_fields(fields)?;
        let controls = build_group(name, fields, model)?;
        let schema = GroupSchema::from_fields(GroupKind::Root, &controls, fields)?;
        debug!(form = %name, fields = fields.len(), "form built");
        Ok(Self {
            name: name.to_string(),
            controls,
            schema,
            tracking: false,
            destroyed: false,
        })
    }

    pub fn from_definition(definition: &FormDefinition) -> Result<Self> {
        Self::build(&definition.name, &definition.fields, definition.model.as_ref())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controls(&self) -> &GroupControl {
        &self.controls
    }

    pub fn schema(&self) -> &GroupSchema {
        &self.schema
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(FormsError::Destroyed);
        }
        Ok(())
    }

    /// Schema node at `path`.
    pub fn get(&self, path: &[&str]) -> Option<SchemaNode> {
        self.schema.get(path)
    }

    /// Leaf field at a dotted path.
    pub fn field(&self, path: &str) -> Result<ControlSchema> {
        match self.get(&split_path(path)) {
            Some(SchemaNode::Control(control)) => Ok(control),
            Some(SchemaNode::Group(_)) => Err(FormsError::NotAScalar {
                path: path.to_string(),
            }),
            None => Err(FormsError::FieldNotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Object group at a dotted path; the empty path is the root.
    fn group(&self, path: &str) -> Result<GroupSchema> {
        let node = self
            .get(&split_path(path))
            .ok_or_else(|| FormsError::FieldNotFound {
                path: path.to_string(),
            })?;
        match node {
            SchemaNode::Group(group) if !group.is_array() => Ok(group),
            _ => Err(FormsError::NotAGroup {
                path: path.to_string(),
            }),
        }
    }

    fn array(&self, path: &str) -> Result<(GroupSchema, ArrayControl)> {
        let node = self
            .get(&split_path(path))
            .ok_or_else(|| FormsError::FieldNotFound {
                path: path.to_string(),
            })?;
        if let SchemaNode::Group(group) = node {
            if let ControlNode::Array(array) = group.control().clone() {
                return Ok((group, array));
            }
        }
        Err(FormsError::NotAnArray {
            path: path.to_string(),
        })
    }

    /// Programmatic write to a leaf.
    pub fn set_value(&self, path: &str, value: Value) -> Result<()> {
        self.ensure_live()?;
        self.field(path)?.control().set_value(value);
        Ok(())
    }

    /// User edit of a leaf: marks it dirty.
    pub fn input(&self, path: &str, value: Value) -> Result<()> {
        self.ensure_live()?;
        self.field(path)?.control().input(value);
        Ok(())
    }

    /// The rendering layer reports focus leaving a leaf.
    pub fn blur(&self, path: &str) -> Result<()> {
        self.ensure_live()?;
        let field = self.field(path)?;
        field.control().mark_touched();
        field.fire_blur();
        Ok(())
    }

    /// The rendering layer reports a choice made in a select-like leaf.
    pub fn select(&self, path: &str, value: Value) -> Result<()> {
        self.ensure_live()?;
        let field = self.field(path)?;
        field.control().input(value);
        field.fire_select();
        Ok(())
    }

    /// Attach errors reported from outside, such as a server response.
    pub fn set_external_errors(&self, path: &str, messages: Vec<String>) -> Result<()> {
        self.ensure_live()?;
        self.field(path)?.control().set_external_errors(messages);
        Ok(())
    }

    /// Add a field to the root group. See [`add_field_at`](Self::add_field_at).
    pub fn add_field(&mut self, name: &str, descriptor: FieldSchema) -> Result<()> {
        self.add_field_at("", name, descriptor)
    }

    /// Add a field to the object group at `group_path`, mirroring it into
    /// both trees.
    ///
    /// A name that already exists in that group is logged and ignored. While
    /// tracking is active, the new field's dependencies are bound at once.
    pub fn add_field_at(&mut self, group_path: &str, name: &str, mut descriptor: FieldSchema) -> Result<()> {
        self.ensure_live()?;
        descriptor.name = name.to_string();
        descriptor.validate()?;

        let group = self.group(group_path)?;
        let ControlNode::Group(group_control) = group.control().clone() else {
            return Err(FormsError::NotAGroup {
                path: group_path.to_string(),
            });
        };
        if group.contains(name) || group_control.contains(name) {
            warn!(form = %self.name, group = %group_path, field = %name, "field already exists, ignoring add");
            return Ok(());
        }

        let control = build_control(&descriptor, None)?;
        let node = SchemaNode::from_field(&descriptor, control.clone())?;
        group_control.add_control(control);
        group.add_child(node.clone());
        debug!(form = %self.name, field = %node.path(), "field added");

        if self.tracking {
            self.bind_subtree(&node)?;
        }
        Ok(())
    }

    /// Register a dependency on the leaf at `path`, binding it if tracking
    /// is active.
    pub fn add_dependency(&mut self, path: &str, declaration: DependencyDeclaration) -> Result<Dependency> {
        self.ensure_live()?;
        let field = self.field(path)?;
        let dependency = field.add_dependency(declaration);
        if self.tracking {
            dependency.bind()?;
        }
        Ok(dependency)
    }

    fn bind_subtree(&self, node: &SchemaNode) -> Result<()> {
        match node {
            SchemaNode::Control(control) => control
                .dependencies()
                .iter()
                .try_for_each(Dependency::bind),
            SchemaNode::Group(group) => lifecycle::start_all(group),
        }
    }

    /// Append an item to the array at `array_path`, seeded from `model`.
    /// Returns the new item's index.
    pub fn push_array_item(&mut self, array_path: &str, model: Option<&Value>) -> Result<usize> {
        self.ensure_live()?;
        let (schema, control) = self.array(array_path)?;
        let item_control = build_item(schema.item_fields(), model)?;
        let index = control.push(item_control.clone());
        let item_schema = GroupSchema::from_fields(GroupKind::Item, &item_control, schema.item_fields())?;
        schema.push_item(item_schema.clone());
        debug!(form = %self.name, array = %array_path, index, "array item pushed");
        if self.tracking {
            lifecycle::start_all(&item_schema)?;
        }
        Ok(index)
    }

    /// Remove an array item, destroying every dependency inside it first.
    ///
    /// Dependencies elsewhere whose source was a field of the removed item
    /// resolve their source again; if the name no longer resolves they stay
    /// unbound.
    pub fn remove_array_item(&mut self, array_path: &str, index: usize) -> Result<()> {
        self.ensure_live()?;
        let (schema, control) = self.array(array_path)?;
        let len = control.len();
        let item = match schema.child(&index.to_string()) {
            Some(SchemaNode::Group(item)) if index < len => item,
            _ => {
                return Err(FormsError::IndexOutOfBounds {
                    path: array_path.to_string(),
                    index,
                    len,
                })
            }
        };
        let detached = lifecycle::detach_sources_in(&self.schema, &item);
        lifecycle::destroy_all(&item);
        schema.remove_item(index);
        control.remove_at(index);
        debug!(form = %self.name, array = %array_path, index, "array item removed");
        if self.tracking {
            for dependency in detached {
                if let Err(error) = dependency.bind() {
                    warn!(
                        form = %self.name,
                        source = %dependency.declaration().source,
                        %error,
                        "dependency left unbound after its source was removed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Bind every dependency in the form. Calling it again does nothing.
    pub fn start_dependency_tracking(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.tracking {
            return Ok(());
        }
        lifecycle::start_all(&self.schema)?;
        self.tracking = true;
        Ok(())
    }

    /// Evaluate every dependency once against current values.
    pub fn execute_dependencies_once(&self) -> Result<()> {
        self.ensure_live()?;
        lifecycle::execute_all_once(&self.schema)
    }

    /// Write `model` into the existing tree without emitting value changes,
    /// then recompute every dependency in one pass.
    ///
    /// Keys missing from `model` keep their current value. Arrays are grown
    /// or shrunk to the model's length.
    pub fn restore(&mut self, model: &Value) -> Result<()> {
        self.ensure_live()?;
        let root = self.schema.clone();
        self.restore_group(&root, model)?;
        self.execute_dependencies_once()?;
        ControlNode::Group(self.controls.clone()).validate_tree();
        debug!(form = %self.name, "form restored");
        Ok(())
    }

    fn restore_group(&mut self, group: &GroupSchema, model: &Value) -> Result<()> {
        let Value::Object(entries) = model else {
            return Ok(());
        };
        for child in group.children() {
            let Some(value) = entries.get(&child.name()) else {
                continue;
            };
            match &child {
                SchemaNode::Control(control) => control.control().restore_value(value.clone()),
                SchemaNode::Group(nested) if nested.is_array() => {
                    self.restore_array(nested, value)?;
                }
                SchemaNode::Group(nested) => self.restore_group(nested, value)?,
            }
        }
        Ok(())
    }

    fn restore_array(&mut self, array: &GroupSchema, model: &Value) -> Result<()> {
        let Value::Array(items) = model else {
            return Ok(());
        };
        let path = SchemaNode::Group(array.clone()).path();
        while array.len() > items.len() {
            self.remove_array_item(&path, array.len() - 1)?;
        }
        for (index, item) in items.iter().enumerate() {
            if index >= array.len() {
                self.push_array_item(&path, Some(item))?;
            } else if let Some(SchemaNode::Group(existing)) = array.child(&index.to_string()) {
                self.restore_group(&existing, item)?;
            }
        }
        Ok(())
    }

    /// Form value without disabled fields.
    pub fn value(&self) -> Value {
        self.controls.value()
    }

    /// Form value including disabled fields.
    pub fn raw_value(&self) -> Value {
        self.controls.raw_value()
    }

    /// Mark everything touched and return the raw value.
    pub fn submit(&self) -> Value {
        self.controls.mark_all_touched();
        debug!(form = %self.name, valid = self.is_valid(), "form submitted");
        self.raw_value()
    }

    pub fn is_valid(&self) -> bool {
        self.controls.is_valid()
    }

    /// Errors of every invalid, enabled leaf, keyed by path.
    pub fn errors(&self) -> IndexMap<String, ValidationErrors> {
        self.schema
            .controls()
            .into_iter()
            .filter(|field| !field.control().is_valid())
            .map(|field| (field.path(), field.control().errors()))
            .collect()
    }

    /// Rendering view of every leaf in tree order.
    pub fn field_states(&self) -> Vec<FieldState> {
        self.schema.controls().iter().map(ControlSchema::state).collect()
    }

    /// Tear down every dependency. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        lifecycle::destroy_all(&self.schema);
        self.tracking = false;
        self.destroyed = true;
        debug!(form = %self.name, "form destroyed");
    }
}

impl Drop for Form {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.name)
            .field("tracking", &self.tracking)
            .field("destroyed", &self.destroyed)
            .field("schema", &self.schema.to_debug_value())
            .finish()
    }
}
