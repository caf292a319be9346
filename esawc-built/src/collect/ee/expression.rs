use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of the root node in a serialized expression
const ROOT_KEY: &str = "0";

/// One node of an Earth Engine expression graph
///
/// Serializes to the REST representation, e.g.
/// `{"constantValue": 50}` or
/// `{"functionInvocationValue": {"functionName": "Image.select", "arguments": {...}}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueNode {
    ConstantValue(Value),
    FunctionInvocationValue(FunctionInvocation),
}

/// Call of a named server-side function with keyword arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub function_name: String,
    pub arguments: BTreeMap<String, ValueNode>,
}

impl ValueNode {
    /// Constant leaf
    pub fn constant(value: impl Into<Value>) -> Self {
        ValueNode::ConstantValue(value.into())
    }

    /// Function call node
    pub fn invoke<'a>(
        function_name: &str,
        arguments: impl IntoIterator<Item = (&'a str, ValueNode)>,
    ) -> Self {
        ValueNode::FunctionInvocationValue(FunctionInvocation {
            function_name: function_name.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        })
    }

    /// Function name if this node is a call
    pub fn function_name(&self) -> Option<&str> {
        match self {
            ValueNode::FunctionInvocationValue(call) => Some(&call.function_name),
            ValueNode::ConstantValue(_) => None,
        }
    }

    /// Named argument if this node is a call
    pub fn argument(&self, name: &str) -> Option<&ValueNode> {
        match self {
            ValueNode::FunctionInvocationValue(call) => call.arguments.get(name),
            ValueNode::ConstantValue(_) => None,
        }
    }

    /// Constant payload if this node is a leaf
    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            ValueNode::ConstantValue(value) => Some(value),
            ValueNode::FunctionInvocationValue(_) => None,
        }
    }

    /// Depth-first search for the first call of `function_name`
    pub fn find_invocation(&self, function_name: &str) -> Option<&ValueNode> {
        match self {
            ValueNode::ConstantValue(_) => None,
            ValueNode::FunctionInvocationValue(call) => {
                if call.function_name == function_name {
                    return Some(self);
                }
                call.arguments
                    .values()
                    .find_map(|arg| arg.find_invocation(function_name))
            }
        }
    }
}

/// Serialized expression sent to `value:compute` and `maps`
///
/// The graph is stored as a single root value, without shared sub-expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String, ValueNode>,
}

impl Expression {
    pub fn new(root: ValueNode) -> Self {
        let mut values = BTreeMap::new();
        values.insert(ROOT_KEY.to_string(), root);
        Expression {
            result: ROOT_KEY.to_string(),
            values,
        }
    }

    pub fn root(&self) -> Option<&ValueNode> {
        self.values.get(&self.result)
    }
}
