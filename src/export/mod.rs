//! Python source export
//!
//! Renders a graph as a standalone Python script. Nodes are emitted in the
//! order the execution engine runs them; each becomes `v<id> = ...`, either a
//! direct call of an importable callable or an expansion of its substitution
//! template. Data nodes are inlined as literals and redirects are transparent.

pub mod template;

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};

use crate::error::ExportError;
use crate::literal::Value;
use crate::nodes::execution_engine::{resolve_source, ExecutionEngine};
use crate::nodes::node::{CallableNode, Node, NodeId, NodeKind, NodeMode, ProxyPayload};
use crate::nodes::operator::OperatorDef;
use crate::nodes::port::{InputSocketId, OutputSocketId};
use crate::nodes::signature::{ParamKind, Parameter, SignatureRecord};
use crate::nodes::NodeGraph;

use self::template::{SubstitutionTemplate, TARGET_SLOT};

const INDENT: &str = "    ";

/// Extra wrapping around the exported statements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Put the statements inside `def main():`
    pub wrap_in_main: bool,
    /// Add an `if __name__ == "__main__":` guard
    pub add_main_guard: bool,
}

/// How a parameter receives its value in the exported code
#[derive(Debug, Clone, PartialEq)]
enum ArgExpr {
    /// Explicit source expression
    Given(String),
    /// Left to the callable's default
    Default(String),
}

impl ArgExpr {
    fn text(&self) -> &str {
        match self {
            ArgExpr::Given(text) | ArgExpr::Default(text) => text,
        }
    }
}

/// One item of a variable parameter
#[derive(Debug, Clone, PartialEq)]
struct VarItem {
    keyword: Option<String>,
    unpacking: bool,
    expr: String,
}

/// Python exporter over one graph
pub struct PythonExporter<'g> {
    graph: &'g NodeGraph,
    options: ExportOptions,
    /// Expression of every output already assigned to a variable
    exprs: HashMap<OutputSocketId, String>,
    stlib_imports: BTreeSet<String>,
    third_party_imports: BTreeSet<String>,
    statements: Vec<String>,
}

impl<'g> PythonExporter<'g> {
    pub fn new(graph: &'g NodeGraph, options: ExportOptions) -> Self {
        Self {
            graph,
            options,
            exprs: HashMap::new(),
            stlib_imports: BTreeSet::new(),
            third_party_imports: BTreeSet::new(),
            statements: Vec::new(),
        }
    }

    /// Renders the whole graph. Nothing is returned unless every node exports.
    pub fn export(mut self) -> Result<String, ExportError> {
        let graph = self.graph;
        let order = ExecutionEngine::execution_order(graph, None).map_err(ExportError::Cycle)?;
        for id in order {
            let Some(node) = graph.node(id) else {
                continue;
            };
            if node.commented_out {
                debug!("Not exporting commented-out node {}", id);
                continue;
            }
            self.export_node(node)?;
        }
        info!("Exported {} statements", self.statements.len());
        Ok(self.assemble())
    }

    fn export_node(&mut self, node: &Node) -> Result<(), ExportError> {
        match &node.kind {
            // inlined where they are used
            NodeKind::Proxy(_) => Ok(()),
            NodeKind::Operator(op) if node.mode == NodeMode::Callable => {
                self.assign(node, op.operator.lambda_source());
                Ok(())
            }
            NodeKind::Operator(op) => self.export_operator(node, op.operator, &op.signature),
            NodeKind::Callable(callable) if node.mode == NodeMode::Callable => {
                if !callable.def.is_importable() {
                    return Err(ExportError::NonExportable {
                        node_id: node.id,
                        reason: format!("'{}' has no import to reference it by", callable.def.name),
                    });
                }
                self.collect_imports(callable);
                self.assign(node, callable.def.call_name().to_string());
                Ok(())
            }
            NodeKind::Callable(callable) => {
                if callable.def.is_importable() {
                    self.export_call(node, callable)
                } else if let Some(template) = &callable.def.substitution {
                    self.export_template(node, callable, template)
                } else {
                    Err(ExportError::NonExportable {
                        node_id: node.id,
                        reason: format!(
                            "'{}' has neither an import nor a substitution template",
                            callable.def.name
                        ),
                    })
                }
            }
        }
    }

    fn export_operator(
        &mut self,
        node: &Node,
        operator: &OperatorDef,
        signature: &SignatureRecord,
    ) -> Result<(), ExportError> {
        let mut missing = Vec::new();
        let mut values: HashMap<&str, String> = HashMap::new();
        for param in &signature.parameters {
            match self.param_expr(node, param)? {
                Some(expr) => {
                    values.insert(param.name.as_str(), parenthesize(expr.text()));
                }
                None => missing.push(param.name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ExportError::MissingInput { node_id: node.id, params: missing });
        }
        let expression = operator
            .template()
            .render(&values)
            .map_err(|message| ExportError::Template { node_id: node.id, message })?;
        self.assign(node, expression);
        Ok(())
    }

    fn export_call(&mut self, node: &Node, callable: &CallableNode) -> Result<(), ExportError> {
        let signature = &callable.signature;
        let mut missing = Vec::new();
        let mut positional: Vec<(String, ArgExpr)> = Vec::new();
        let mut var_positional: Vec<VarItem> = Vec::new();
        let mut keywords: Vec<String> = Vec::new();

        for param in &signature.parameters {
            match param.kind {
                ParamKind::Positional => match self.param_expr(node, param)? {
                    Some(expr) => positional.push((param.name.clone(), expr)),
                    None => missing.push(param.name.clone()),
                },
                ParamKind::KeywordOnly => match self.param_expr(node, param)? {
                    Some(ArgExpr::Given(expr)) => keywords.push(format!("{}={}", param.name, expr)),
                    Some(ArgExpr::Default(_)) => {}
                    None => missing.push(param.name.clone()),
                },
                ParamKind::VarPositional => {
                    var_positional = self.var_items(node, callable, param, &mut missing)?;
                }
                ParamKind::VarKeyword => {
                    for item in self.var_items(node, callable, param, &mut missing)? {
                        match (item.unpacking, item.keyword) {
                            (true, _) | (false, None) => keywords.push(format!("**{}", item.expr)),
                            (false, Some(keyword)) => keywords.push(format!("{}={}", keyword, item.expr)),
                        }
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(ExportError::MissingInput { node_id: node.id, params: missing });
        }

        // Defaults can only be left out when no *args item follows them
        let mut args = Vec::new();
        let mut skipped_default = false;
        for (name, expr) in positional {
            match expr {
                ArgExpr::Default(text) if !var_positional.is_empty() => args.push(text),
                ArgExpr::Default(_) => skipped_default = true,
                ArgExpr::Given(text) if skipped_default => args.push(format!("{}={}", name, text)),
                ArgExpr::Given(text) => args.push(text),
            }
        }
        args.extend(var_positional.into_iter().map(|item| {
            if item.unpacking {
                format!("*{}", item.expr)
            } else {
                item.expr
            }
        }));
        args.extend(keywords);

        self.collect_imports(callable);
        let call = format!("{}({})", callable.def.call_name(), args.join(", "));
        self.assign(node, call);
        Ok(())
    }

    fn export_template(
        &mut self,
        node: &Node,
        callable: &CallableNode,
        template: &SubstitutionTemplate,
    ) -> Result<(), ExportError> {
        let signature = &callable.signature;
        let known: BTreeSet<&str> = signature.parameters.iter().map(|param| param.name.as_str()).collect();
        let free = template.free_slots(&known);
        if !free.is_empty() {
            return Err(ExportError::Template {
                node_id: node.id,
                message: format!("slots without a parameter: {}", free.join(", ")),
            });
        }

        let mut missing = Vec::new();
        let mut values: HashMap<&str, String> = HashMap::new();
        for param in &signature.parameters {
            let rendered = match param.kind {
                ParamKind::Positional | ParamKind::KeywordOnly => match self.param_expr(node, param)? {
                    Some(expr) => expr.text().to_string(),
                    None => {
                        missing.push(param.name.clone());
                        continue;
                    }
                },
                ParamKind::VarPositional => {
                    let items = self.var_items(node, callable, param, &mut missing)?;
                    let parts: Vec<String> = items
                        .into_iter()
                        .map(|item| if item.unpacking { format!("*{}", item.expr) } else { item.expr })
                        .collect();
                    format!("[{}]", parts.join(", "))
                }
                ParamKind::VarKeyword => {
                    let items = self.var_items(node, callable, param, &mut missing)?;
                    let parts: Vec<String> = items
                        .into_iter()
                        .map(|item| match (item.unpacking, item.keyword) {
                            (false, Some(keyword)) => format!("{}: {}", Value::Str(keyword).repr(), item.expr),
                            _ => format!("**{}", item.expr),
                        })
                        .collect();
                    format!("{{{}}}", parts.join(", "))
                }
            };
            values.insert(param.name.as_str(), rendered);
        }
        if !missing.is_empty() {
            return Err(ExportError::MissingInput { node_id: node.id, params: missing });
        }

        let variable = variable_name(node.id);
        let template_error = |message| ExportError::Template { node_id: node.id, message };
        self.collect_imports(callable);
        if template.is_statement() {
            values.insert(TARGET_SLOT, variable);
            let block = template.render(&values).map_err(template_error)?;
            self.statements.push(block);
            self.register_outputs(node);
        } else {
            let expression = template.render(&values).map_err(template_error)?;
            self.assign(node, expression);
        }
        Ok(())
    }

    /// Expression for a fixed parameter: its parent, then its widget, then
    /// its default. `None` when the parameter has no value at all.
    fn param_expr(&self, node: &Node, param: &Parameter) -> Result<Option<ArgExpr>, ExportError> {
        let socket = InputSocketId::param(node.id, &param.name);
        if let Some(expr) = self.socket_expr(&socket)? {
            return Ok(Some(ArgExpr::Given(expr)));
        }
        let widget_value = node.widget_value(&param.name, None);
        match (widget_value, &param.default) {
            (Some(value), Some(default)) if value == default => Ok(Some(ArgExpr::Default(literal(node.id, value)?))),
            (Some(value), _) => Ok(Some(ArgExpr::Given(literal(node.id, value)?))),
            (None, Some(default)) => Ok(Some(ArgExpr::Default(literal(node.id, default)?))),
            (None, None) => Ok(None),
        }
    }

    fn var_items(
        &self,
        node: &Node,
        callable: &CallableNode,
        param: &Parameter,
        missing: &mut Vec<String>,
    ) -> Result<Vec<VarItem>, ExportError> {
        let mut items = Vec::new();
        for (index, subparam) in callable.subparams(&param.name).iter().enumerate() {
            let socket = InputSocketId::subparam(node.id, &param.name, index);
            let expr = match self.socket_expr(&socket)? {
                Some(expr) => Some(expr),
                None => match &subparam.widget {
                    Some(widget) => Some(literal(node.id, widget.get())?),
                    None => None,
                },
            };
            match expr {
                Some(expr) => items.push(VarItem {
                    keyword: subparam.keyword.clone(),
                    unpacking: subparam.unpacking,
                    expr,
                }),
                None => missing.push(format!("{}[{}]", param.name, index)),
            }
        }
        Ok(items)
    }

    /// Expression arriving at an input socket from upstream, if any
    fn socket_expr(&self, socket: &InputSocketId) -> Result<Option<String>, ExportError> {
        let Some(source) = self.graph.parent_of(socket).and_then(|parent| resolve_source(self.graph, parent)) else {
            return Ok(None);
        };
        let Some(node) = self.graph.node(source.node_id) else {
            return Ok(None);
        };
        if node.commented_out {
            return Ok(None);
        }
        if let Some(ProxyPayload::Data(widget)) = node.as_proxy().map(|proxy| &proxy.payload) {
            return literal(node.id, widget.get()).map(Some);
        }
        Ok(self.exprs.get(source).cloned())
    }

    /// Emits `v<id> = expression` and records the node's outputs
    fn assign(&mut self, node: &Node, expression: String) {
        self.statements.push(format!("{} = {}", variable_name(node.id), expression));
        self.register_outputs(node);
    }

    fn register_outputs(&mut self, node: &Node) {
        let variable = variable_name(node.id);
        let outputs = node.output_sockets();
        let multi = node.mode != NodeMode::Callable && outputs.len() > 1;
        for output in outputs {
            let expr = if multi {
                format!("{}[{}]", variable, Value::Str(output.output_name.clone()).repr())
            } else {
                variable.clone()
            };
            self.exprs.insert(output, expr);
        }
    }

    fn collect_imports(&mut self, callable: &CallableNode) {
        if let Some(text) = &callable.def.stlib_import_text {
            self.stlib_imports.insert(text.clone());
        }
        if let Some(text) = &callable.def.third_party_import_text {
            self.third_party_imports.insert(text.clone());
        }
    }

    fn assemble(self) -> String {
        let mut code = String::new();
        for imports in [&self.stlib_imports, &self.third_party_imports] {
            if imports.is_empty() {
                continue;
            }
            for import in imports {
                code.push_str(import);
                code.push('\n');
            }
            code.push('\n');
        }

        let body: Vec<&str> = self.statements.iter().flat_map(|statement| statement.lines()).collect();
        match (self.options.wrap_in_main, self.options.add_main_guard) {
            (false, false) => push_block(&mut code, &body, 0),
            (true, guard) => {
                code.push_str("def main():\n");
                if body.is_empty() {
                    code.push_str(INDENT);
                    code.push_str("pass\n");
                } else {
                    push_block(&mut code, &body, 1);
                }
                if guard {
                    code.push_str("\nif __name__ == \"__main__\":\n");
                    code.push_str(INDENT);
                    code.push_str("main()\n");
                }
            }
            (false, true) => {
                code.push_str("if __name__ == \"__main__\":\n");
                if body.is_empty() {
                    code.push_str(INDENT);
                    code.push_str("pass\n");
                } else {
                    push_block(&mut code, &body, 1);
                }
            }
        }
        code
    }
}

/// Exports `graph` with the given options
pub fn export_graph(graph: &NodeGraph, options: ExportOptions) -> Result<String, ExportError> {
    PythonExporter::new(graph, options).export()
}

fn variable_name(id: NodeId) -> String {
    format!("v{}", id)
}

fn literal(node_id: NodeId, value: &Value) -> Result<String, ExportError> {
    if !value.is_literal() {
        return Err(ExportError::NonExportable {
            node_id,
            reason: format!("{} value has no literal form", value.type_name()),
        });
    }
    Ok(value.repr())
}

/// Wraps operands that could bind differently next to an operator
fn parenthesize(expr: &str) -> String {
    let simple = expr
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\'' | '"' | '[' | ']'));
    if simple {
        expr.to_string()
    } else {
        format!("({})", expr)
    }
}

fn push_block(code: &mut String, lines: &[&str], depth: usize) {
    for line in lines {
        if !line.is_empty() {
            code.push_str(&INDENT.repeat(depth));
        }
        code.push_str(line);
        code.push('\n');
    }
}
