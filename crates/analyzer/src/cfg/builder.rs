//! Builds the CFG skeleton from a function body's statement tree.
//!
//! Lowering is per-node best effort, so the builder's job is purely shape:
//! every structured construct (`if`, `for`, `while`, `do`) becomes a header
//! node with explicit merge nodes, and statements that terminate control
//! flow (`return`, `revert`, `break`, `continue`) produce no fall-through.

use serde_json::Value;

use crate::cfg::{Cfg, NodeId, NodeType};

pub fn build_cfg(body: &Value) -> Cfg {
    let mut builder = CfgBuilder {
        cfg: Cfg::new(),
        loop_stack: Vec::new(),
    };
    let entry = builder.cfg.entry();
    builder.statement(body, entry);
    builder.cfg
}

struct CfgBuilder {
    cfg: Cfg,
    /// `(continue_target, break_target)` for each enclosing loop.
    loop_stack: Vec<(NodeId, NodeId)>,
}

impl CfgBuilder {
    fn statements(&mut self, statements: &[Value], pred: NodeId) -> Option<NodeId> {
        let mut current = Some(pred);
        for statement in statements {
            // Statements after a terminator are unreachable; stop here.
            let Some(pred) = current else { break };
            current = self.statement(statement, pred);
        }
        current
    }

    fn statement(&mut self, statement: &Value, pred: NodeId) -> Option<NodeId> {
        let node_type = statement["nodeType"].as_str().unwrap_or("");
        match node_type {
            "Block" | "UncheckedBlock" => {
                let statements = statement["statements"].as_array().cloned().unwrap_or_default();
                self.statements(&statements, pred)
            }
            "ExpressionStatement" => {
                Some(self.simple(NodeType::Expression, Some(&statement["expression"]), pred))
            }
            "EmitStatement" => {
                Some(self.simple(NodeType::Expression, Some(&statement["eventCall"]), pred))
            }
            "VariableDeclarationStatement" => {
                Some(self.simple(NodeType::VariableDeclaration, Some(statement), pred))
            }
            "Return" => {
                self.simple(NodeType::Return, Some(statement), pred);
                None
            }
            "RevertStatement" => {
                self.simple(NodeType::Expression, Some(&statement["errorCall"]), pred);
                None
            }
            "Break" => {
                if let Some(&(_, break_target)) = self.loop_stack.last() {
                    self.cfg.add_edge(pred, break_target);
                }
                None
            }
            "Continue" => {
                if let Some(&(continue_target, _)) = self.loop_stack.last() {
                    self.cfg.add_edge(pred, continue_target);
                }
                None
            }
            "IfStatement" => self.if_statement(statement, pred),
            "ForStatement" => self.for_statement(statement, pred),
            "WhileStatement" => self.while_statement(statement, pred),
            "DoWhileStatement" => self.do_while_statement(statement, pred),
            "InlineAssembly" => Some(self.simple(NodeType::Assembly, Some(statement), pred)),
            "PlaceholderStatement" => {
                Some(self.simple(NodeType::Placeholder, Some(statement), pred))
            }
            // Anything else is preserved as an expression node; the lowering
            // degrades it to an Unsupported operation with a diagnostic.
            _ => Some(self.simple(NodeType::Expression, Some(statement), pred)),
        }
    }

    fn if_statement(&mut self, statement: &Value, pred: NodeId) -> Option<NodeId> {
        let condition = self.simple(NodeType::If, Some(&statement["condition"]), pred);

        let true_exit = self.statement(&statement["trueBody"], condition);
        let false_exit = if statement["falseBody"].is_null() {
            Some(condition)
        } else {
            self.statement(&statement["falseBody"], condition)
        };

        match (true_exit, false_exit) {
            (None, None) => None,
            (true_exit, false_exit) => {
                let end = self.cfg.add_node(NodeType::EndIf);
                if let Some(exit) = true_exit {
                    self.cfg.add_edge(exit, end);
                }
                if let Some(exit) = false_exit {
                    self.cfg.add_edge(exit, end);
                }
                Some(end)
            }
        }
    }

    fn for_statement(&mut self, statement: &Value, pred: NodeId) -> Option<NodeId> {
        let pred = if statement["initializationExpression"].is_null() {
            pred
        } else {
            self.statement(&statement["initializationExpression"], pred)
                .unwrap_or(pred)
        };

        let condition = if statement["condition"].is_null() {
            None
        } else {
            Some(statement["condition"].clone())
        };
        let header = self.simple_detached(NodeType::Loop, condition.as_ref());
        self.cfg.add_edge(pred, header);

        let end = self.cfg.add_node(NodeType::EndLoop);

        let latch = if statement["loopExpression"].is_null() {
            None
        } else {
            Some(self.simple_detached(
                NodeType::Expression,
                Some(&statement["loopExpression"]["expression"]),
            ))
        };

        self.loop_stack.push((latch.unwrap_or(header), end));
        let body_exit = self.statement(&statement["body"], header);
        self.loop_stack.pop();

        if let Some(latch) = latch {
            if let Some(exit) = body_exit {
                self.cfg.add_edge(exit, latch);
            }
            self.cfg.add_edge(latch, header);
        } else if let Some(exit) = body_exit {
            self.cfg.add_edge(exit, header);
        }

        self.cfg.add_edge(header, end);
        Some(end)
    }

    fn while_statement(&mut self, statement: &Value, pred: NodeId) -> Option<NodeId> {
        let header = self.simple(NodeType::Loop, Some(&statement["condition"]), pred);
        let end = self.cfg.add_node(NodeType::EndLoop);

        self.loop_stack.push((header, end));
        let body_exit = self.statement(&statement["body"], header);
        self.loop_stack.pop();

        if let Some(exit) = body_exit {
            self.cfg.add_edge(exit, header);
        }
        self.cfg.add_edge(header, end);
        Some(end)
    }

    fn do_while_statement(&mut self, statement: &Value, pred: NodeId) -> Option<NodeId> {
        // The body anchor guarantees a stable back-edge target even when the
        // body opens with nested control flow.
        let body_head = self.simple(NodeType::Expression, None, pred);
        let header = self.simple_detached(NodeType::Loop, Some(&statement["condition"]));
        let end = self.cfg.add_node(NodeType::EndLoop);

        self.loop_stack.push((header, end));
        let body_exit = self.statement(&statement["body"], body_head);
        self.loop_stack.pop();

        if let Some(exit) = body_exit {
            self.cfg.add_edge(exit, header);
        }
        self.cfg.add_edge(header, body_head);
        self.cfg.add_edge(header, end);
        Some(end)
    }

    fn simple(&mut self, node_type: NodeType, expression: Option<&Value>, pred: NodeId) -> NodeId {
        let id = self.simple_detached(node_type, expression);
        self.cfg.add_edge(pred, id);
        id
    }

    fn simple_detached(&mut self, node_type: NodeType, expression: Option<&Value>) -> NodeId {
        let id = self.cfg.add_node(node_type);
        let node = self.cfg.node_mut(id);
        if let Some(expression) = expression {
            node.src = expression["src"].as_str().map(str::to_string);
            node.expression = Some(expression.clone());
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_straight_line_body() {
        let body = json!({
            "nodeType": "Block",
            "statements": [
                {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "a", "src": "0:1:0"}},
                {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "b", "src": "2:1:0"}}
            ]
        });
        let cfg = build_cfg(&body);
        assert_eq!(cfg.len(), 3);
        assert_eq!(cfg.node(1).node_type, NodeType::Expression);
        assert_eq!(cfg.node(1).sons, vec![2]);
    }

    #[test]
    fn test_if_else_merges_at_endif() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "IfStatement",
                "condition": {"nodeType": "Identifier", "name": "c"},
                "trueBody": {"nodeType": "Block", "statements": [
                    {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "t"}}
                ]},
                "falseBody": {"nodeType": "Block", "statements": [
                    {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "f"}}
                ]}
            }]
        });
        let cfg = build_cfg(&body);
        let condition = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::If)
            .unwrap();
        assert_eq!(condition.sons.len(), 2);
        let end = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::EndIf)
            .unwrap();
        assert_eq!(end.fathers.len(), 2);
    }

    #[test]
    fn test_return_stops_fall_through() {
        let body = json!({
            "nodeType": "Block",
            "statements": [
                {"nodeType": "Return", "expression": null},
                {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "dead"}}
            ]
        });
        let cfg = build_cfg(&body);
        // Entry + return only; the trailing statement is unreachable.
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.node(1).node_type, NodeType::Return);
    }

    #[test]
    fn test_while_has_back_edge_and_exit() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "WhileStatement",
                "condition": {"nodeType": "Identifier", "name": "c"},
                "body": {"nodeType": "Block", "statements": [
                    {"nodeType": "ExpressionStatement", "expression": {"nodeType": "Identifier", "name": "x"}}
                ]}
            }]
        });
        let cfg = build_cfg(&body);
        let header = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::Loop)
            .unwrap();
        let body_node = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::Expression)
            .unwrap();
        assert!(header.sons.contains(&body_node.id));
        assert!(body_node.sons.contains(&header.id));
        assert!(header
            .sons
            .iter()
            .any(|&s| cfg.node(s).node_type == NodeType::EndLoop));
    }

    #[test]
    fn test_break_targets_end_loop() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "WhileStatement",
                "condition": {"nodeType": "Identifier", "name": "c"},
                "body": {"nodeType": "Block", "statements": [
                    {"nodeType": "Break"}
                ]}
            }]
        });
        let cfg = build_cfg(&body);
        let header = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::Loop)
            .unwrap();
        let end = cfg
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::EndLoop)
            .unwrap();
        assert!(end.fathers.contains(&header.id));
    }
}
