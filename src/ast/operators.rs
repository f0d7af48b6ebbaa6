use crate::ast::Token;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Comparison
    /// Structural equality (`eq`)
    Equal,
    /// Greater than (`gt`)
    GreaterThan,
    /// Less than (`lt`)
    LessThan,
    /// Greater than or equal (`gte`)
    GreaterEqual,
    /// Less than or equal (`lte`)
    LessEqual,

    // Arithmetic
    /// Addition or string concatenation (`plus`)
    Add,
    /// Subtraction (`minus`)
    Subtract,
    /// Multiplication (`mult`)
    Multiply,
    /// Division (`div`)
    Divide,
    /// Modulo (`mod`)
    Modulo,
}

/// Verbs that iterate a container through a lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Map,
    Filter,
    Any,
    KeyBy,
    MapValues,
    MapKeys,
    GroupBy,
    FilterBy,
    AnyValues,
}

/// Single-operand verbs without a lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Values,
    Keys,
    Assign,
    Defaults,
    Size,
}

impl BinOp {
    pub fn token(self) -> Token {
        match self {
            BinOp::Equal => Token::Eq,
            BinOp::GreaterThan => Token::Gt,
            BinOp::LessThan => Token::Lt,
            BinOp::GreaterEqual => Token::Gte,
            BinOp::LessEqual => Token::Lte,
            BinOp::Add => Token::Plus,
            BinOp::Subtract => Token::Minus,
            BinOp::Multiply => Token::Mult,
            BinOp::Divide => Token::Div,
            BinOp::Modulo => Token::Mod,
        }
    }

    pub fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            Token::Eq => BinOp::Equal,
            Token::Gt => BinOp::GreaterThan,
            Token::Lt => BinOp::LessThan,
            Token::Gte => BinOp::GreaterEqual,
            Token::Lte => BinOp::LessEqual,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Subtract,
            Token::Mult => BinOp::Multiply,
            Token::Div => BinOp::Divide,
            Token::Mod => BinOp::Modulo,
            _ => return None,
        })
    }
}

impl Collection {
    pub fn token(self) -> Token {
        match self {
            Collection::Map => Token::Map,
            Collection::Filter => Token::Filter,
            Collection::Any => Token::Any,
            Collection::KeyBy => Token::KeyBy,
            Collection::MapValues => Token::MapValues,
            Collection::MapKeys => Token::MapKeys,
            Collection::GroupBy => Token::GroupBy,
            Collection::FilterBy => Token::FilterBy,
            Collection::AnyValues => Token::AnyValues,
        }
    }

    pub fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            Token::Map => Collection::Map,
            Token::Filter => Collection::Filter,
            Token::Any => Collection::Any,
            Token::KeyBy => Collection::KeyBy,
            Token::MapValues => Collection::MapValues,
            Token::MapKeys => Collection::MapKeys,
            Token::GroupBy => Collection::GroupBy,
            Token::FilterBy => Collection::FilterBy,
            Token::AnyValues => Collection::AnyValues,
            _ => return None,
        })
    }
}

impl UnaryOp {
    pub fn token(self) -> Token {
        match self {
            UnaryOp::Not => Token::Not,
            UnaryOp::Values => Token::Values,
            UnaryOp::Keys => Token::Keys,
            UnaryOp::Assign => Token::Assign,
            UnaryOp::Defaults => Token::Defaults,
            UnaryOp::Size => Token::Size,
        }
    }

    pub fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            Token::Not => UnaryOp::Not,
            Token::Values => UnaryOp::Values,
            Token::Keys => UnaryOp::Keys,
            Token::Assign => UnaryOp::Assign,
            Token::Defaults => UnaryOp::Defaults,
            Token::Size => UnaryOp::Size,
            _ => return None,
        })
    }
}
