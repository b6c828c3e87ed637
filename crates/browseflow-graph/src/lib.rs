//! Workflow graph model and its document forms.
//!
//! A workflow is an ordered set of [`Node`]s connected by [`Edge`]s. The
//! [`dsl`] module projects a [`Graph`] into the definition document the
//! execution service accepts; [`file`] handles the `workflow.json`
//! interchange format; [`validate`] finds problems before either leaves the
//! editor.

pub mod dsl;
pub mod edge;
pub mod file;
pub mod graph;
pub mod kind;
pub mod node;
pub mod validate;

pub use dsl::{decode, encode, WorkflowDefinition, WorkflowMeta};
pub use edge::Edge;
pub use graph::Graph;
pub use kind::{ContainerKind, NodeKind, Params};
pub use node::{Node, NodeData, NodeDataPatch, Position};
pub use validate::{validate, Issue, Report, Severity};
