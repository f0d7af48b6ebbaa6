//! Reader for models written as JSON token trees.
//!
//! ```text
//! {
//!   "labels": ["map", ["func", ["or", ["get", "label", ["val"]], "untitled"]], ["root"]],
//!   "setLabel": ["$setter", ["arg0"], "label"]
//! }
//! ```
//!
//! An expression is an array headed by a token name with its operands in flat
//! token order. `["val"]`, `["key"]` and `["context"]` refer to the innermost
//! enclosing `func`, and `["val", 1]` to the one around it.

use std::rc::Rc;

use serde_json::Value as Json;

use crate::{
    ast::{
        Definition, DefinitionError, Expr, Lambda, LambdaId, Model, Operand, PathSegment,
        SetterExpression, SpliceSetterExpression, Token,
    },
    convert::from_json,
};

const QUOTE: &str = "$quote";
const SETTER: &str = "$setter";
const SPLICE: &str = "$splice";

pub struct Reader {
    /// Enclosing functions, innermost last
    lambdas: Vec<LambdaId>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    pub fn new() -> Self {
        Reader {
            lambdas: Vec::new(),
        }
    }

    /// Reads a model: a JSON object from name to definition.
    pub fn read_model(&mut self, json: &Json) -> Result<Model, DefinitionError> {
        let entries = json.as_object().ok_or_else(|| DefinitionError::InvalidOperand {
            token: Token::TopLevel,
            message: "a model must be a JSON object".to_string(),
        })?;
        let mut model = Model::new();
        for (name, definition) in entries {
            model.insert(name.clone(), self.read_definition(definition)?);
        }
        Ok(model)
    }

    pub fn read_definition(&mut self, json: &Json) -> Result<Definition, DefinitionError> {
        if let Some(items) = json.as_array()
            && let Some(Json::String(head)) = items.first()
        {
            match head.as_str() {
                SETTER => {
                    let path = read_path(&items[1..])?;
                    return Ok(SetterExpression::new(path).into());
                }
                SPLICE => {
                    let path = read_path(&items[1..])?;
                    return Ok(SpliceSetterExpression::new(path).into());
                }
                _ => {}
            }
        }
        Ok(Definition::Expression(self.read_expr(json)?))
    }

    pub fn read_expr(&mut self, json: &Json) -> Result<Expr, DefinitionError> {
        match json {
            Json::Array(items) => match items.first() {
                Some(Json::String(head)) => self.read_verb(head, &items[1..]),
                _ => Ok(Expr::Array(
                    items
                        .iter()
                        .map(|item| self.read_expr(item))
                        .collect::<Result<Rc<[Expr]>, _>>()?,
                )),
            },
            Json::Object(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, field) in fields {
                    out.push((name.clone(), self.read_expr(field)?));
                }
                Ok(Expr::Object(out.into()))
            }
            scalar => Ok(Expr::Literal(from_json(scalar.clone()))),
        }
    }

    fn read_verb(&mut self, head: &str, operands: &[Json]) -> Result<Expr, DefinitionError> {
        if head == QUOTE {
            return match operands {
                [value] => Ok(Expr::Literal(from_json(value.clone()))),
                _ => Err(DefinitionError::InvalidOperand {
                    token: Token::TopLevel,
                    message: format!("{} takes exactly one value", QUOTE),
                }),
            };
        }

        let token =
            Token::from_name(head).ok_or_else(|| DefinitionError::UnknownVerb(head.to_string()))?;
        match token {
            Token::Val | Token::Key | Token::Context => self.read_reference(token, operands),
            Token::Func => Err(DefinitionError::UnexpectedFunction(Token::Func)),
            _ => {
                let mut ops = Vec::with_capacity(operands.len());
                for operand in operands {
                    ops.push(self.read_operand(operand)?);
                }
                Expr::assemble(token, ops)
            }
        }
    }

    /// `[ref]` or `[ref, depth]`.
    fn read_reference(&self, token: Token, operands: &[Json]) -> Result<Expr, DefinitionError> {
        let depth = match operands {
            [] => 0,
            [Json::Number(n)] => n.as_u64().ok_or_else(|| DefinitionError::InvalidOperand {
                token,
                message: format!("depth must be a non-negative integer, got {}", n),
            })? as usize,
            _ => {
                return Err(DefinitionError::Arity {
                    token,
                    expected: "1 to 2".to_string(),
                    found: operands.len() + 1,
                });
            }
        };
        let id = self
            .lambdas
            .len()
            .checked_sub(depth + 1)
            .map(|i| self.lambdas[i])
            .ok_or(DefinitionError::UnboundReference(token))?;
        Ok(match token {
            Token::Val => Expr::Val(id),
            Token::Key => Expr::Key(id),
            _ => Expr::Context(id),
        })
    }

    fn read_operand(&mut self, json: &Json) -> Result<Operand, DefinitionError> {
        if let Some(items) = json.as_array()
            && let Some(Json::String(head)) = items.first()
            && head == Token::Func.name()
        {
            let [_, body] = items.as_slice() else {
                return Err(DefinitionError::Arity {
                    token: Token::Func,
                    expected: "exactly 2".to_string(),
                    found: items.len(),
                });
            };
            let id = LambdaId::fresh();
            self.lambdas.push(id);
            let body = self.read_expr(body);
            self.lambdas.pop();
            return Ok(Operand::Func(Rc::new(Lambda {
                id,
                body: body?,
                context: None,
            })));
        }
        Ok(Operand::Expr(self.read_expr(json)?))
    }
}

fn read_path(segments: &[Json]) -> Result<Vec<PathSegment>, DefinitionError> {
    segments
        .iter()
        .map(|segment| match segment {
            Json::String(name) => Ok(PathSegment::Field(name.clone())),
            Json::Number(n) => n
                .as_u64()
                .map(|n| PathSegment::Index(n as usize))
                .ok_or_else(|| DefinitionError::InvalidSegment(n.to_string())),
            Json::Array(items) => match items.as_slice() {
                [Json::String(arg)] if arg == Token::Arg0.name() => Ok(PathSegment::Arg(0)),
                [Json::String(arg)] if arg == Token::Arg1.name() => Ok(PathSegment::Arg(1)),
                _ => Err(DefinitionError::InvalidSegment(segment.to_string())),
            },
            other => Err(DefinitionError::InvalidSegment(other.to_string())),
        })
        .collect()
}

impl Model {
    /// Reads a model from its JSON form.
    ///
    /// # Examples
    ///
    /// ```
    /// use derivo::Model;
    ///
    /// let json = serde_json::json!({
    ///     "negated": ["map", ["func", ["not", ["val"]]], ["root"]],
    ///     "set": ["$setter", ["arg0"]]
    /// });
    /// let model = Model::from_json(&json).unwrap();
    /// assert_eq!(model.len(), 2);
    /// ```
    pub fn from_json(json: &Json) -> Result<Model, DefinitionError> {
        Reader::new().read_model(json)
    }
}
