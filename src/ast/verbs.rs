//! Static verb descriptor table.
//!
//! One [`TokenInfo`] per [`Token`], indexed by the token's discriminant. The
//! table drives the token-level constructors ([`crate::Expr::assemble`],
//! [`crate::Expr::chain`]), flattening for display, and the compiler's hoisting
//! decisions. The runtime never consults it.

use crate::ast::Token;

/// Unbounded upper arity.
pub const VARIADIC: usize = usize::MAX;

/// Metadata describing how a token may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: Token,
    pub name: &'static str,
    /// Inclusive bounds on the flat token length, head included.
    pub arity: (usize, usize),
    /// Position of the chained receiver in the flat token form.
    pub chain_index: Option<usize>,
    /// Terminal reference; takes no operands and cannot be chained onto.
    pub non_verb: bool,
    /// Not available as a chain method.
    pub non_chained: bool,
    /// Iterates the elements of a container through a lambda.
    pub collection_verb: bool,
    /// Restricted to ordered sequences.
    pub array_verb: bool,
    /// Internal; rejected in user-built token forms.
    pub private: bool,
    /// Eligible for evaluation outside the enclosing lambda.
    pub try_to_hoist: bool,
}

impl TokenInfo {
    const fn new(token: Token, name: &'static str) -> Self {
        TokenInfo {
            token,
            name,
            arity: (1, VARIADIC),
            chain_index: None,
            non_verb: false,
            non_chained: false,
            collection_verb: false,
            array_verb: false,
            private: false,
            try_to_hoist: false,
        }
    }

    const fn chained(mut self, index: usize, min: usize, max: usize) -> Self {
        self.chain_index = Some(index);
        self.arity = (min, max);
        self
    }

    const fn standalone(mut self, min: usize) -> Self {
        self.non_chained = true;
        self.arity = (min, VARIADIC);
        self
    }

    const fn terminal(mut self) -> Self {
        self.non_verb = true;
        self.non_chained = true;
        self.arity = (1, 1);
        self
    }

    const fn collection(mut self) -> Self {
        self.collection_verb = true;
        self.try_to_hoist = true;
        self
    }

    const fn array(mut self) -> Self {
        self.array_verb = true;
        self
    }

    const fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Whether a flat token form of `len` tokens (head included) fits.
    pub fn accepts_len(&self, len: usize) -> bool {
        len >= self.arity.0 && len <= self.arity.1
    }
}

// [verb, func, receiver, context?]
const fn iterate(token: Token, name: &'static str) -> TokenInfo {
    TokenInfo::new(token, name).chained(2, 3, 4).collection()
}

// [verb, receiver]
const fn unary(token: Token, name: &'static str) -> TokenInfo {
    TokenInfo::new(token, name).chained(1, 2, 2)
}

// [verb, receiver, operand]
const fn binary(token: Token, name: &'static str) -> TokenInfo {
    TokenInfo::new(token, name).chained(1, 3, 3)
}

static TABLE: [TokenInfo; Token::COUNT] = [
    TokenInfo::new(Token::And, "and").standalone(2),
    TokenInfo::new(Token::Or, "or").standalone(2),
    unary(Token::Not, "not"),
    TokenInfo::new(Token::Ternary, "ternary").chained(1, 4, 4),
    TokenInfo::new(Token::Get, "get").chained(2, 3, 3),
    TokenInfo::new(Token::Root, "root").terminal(),
    iterate(Token::MapValues, "mapValues"),
    iterate(Token::Map, "map").array(),
    iterate(Token::Any, "any").array(),
    iterate(Token::KeyBy, "keyBy").array(),
    iterate(Token::Filter, "filter").array(),
    iterate(Token::AnyValues, "anyValues"),
    iterate(Token::FilterBy, "filterBy"),
    iterate(Token::MapKeys, "mapKeys"),
    iterate(Token::GroupBy, "groupBy"),
    unary(Token::Values, "values").collection(),
    unary(Token::Keys, "keys").collection(),
    unary(Token::Assign, "assign").array(),
    unary(Token::Defaults, "defaults").array(),
    TokenInfo::new(Token::Range, "range").chained(1, 2, 4),
    unary(Token::Size, "size"),
    TokenInfo::new(Token::Context, "context").terminal(),
    TokenInfo::new(Token::Func, "func").standalone(2).private(),
    TokenInfo::new(Token::Val, "val").terminal(),
    TokenInfo::new(Token::Key, "key").terminal(),
    TokenInfo::new(Token::Arg0, "arg0").terminal(),
    TokenInfo::new(Token::Arg1, "arg1").terminal(),
    TokenInfo::new(Token::TopLevel, "topLevel").terminal().private(),
    binary(Token::Eq, "eq"),
    binary(Token::Gt, "gt"),
    binary(Token::Lt, "lt"),
    binary(Token::Gte, "gte"),
    binary(Token::Lte, "lte"),
    binary(Token::Plus, "plus"),
    binary(Token::Minus, "minus"),
    binary(Token::Mult, "mult"),
    binary(Token::Div, "div"),
    binary(Token::Mod, "mod"),
    TokenInfo::new(Token::Call, "call").chained(2, 3, VARIADIC),
    TokenInfo::new(Token::Wildcard, "wildcard").terminal().private(),
];

impl Token {
    /// Descriptor for this token.
    pub fn info(self) -> &'static TokenInfo {
        &TABLE[self as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_discriminant() {
        for (i, token) in Token::ALL.iter().enumerate() {
            assert_eq!(*token as usize, i);
            assert_eq!(TABLE[i].token, *token, "table entry {} out of order", i);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for token in Token::ALL {
            assert_eq!(Token::from_name(token.name()), Some(token));
        }
        assert_eq!(Token::from_name("mapValues"), Some(Token::MapValues));
        assert_eq!(Token::from_name("flatMap"), None);
    }

    #[test]
    fn test_collection_verbs_are_hoistable() {
        for token in Token::ALL {
            let info = token.info();
            if info.collection_verb {
                assert!(info.try_to_hoist, "{} should be hoistable", token);
            }
            if info.non_verb {
                assert!(info.non_chained);
                assert_eq!(info.arity, (1, 1));
            }
        }
        assert!(Token::Map.info().array_verb);
        assert!(!Token::MapValues.info().array_verb);
        assert_eq!(Token::Get.info().chain_index, Some(2));
        assert_eq!(Token::Not.info().chain_index, Some(1));
    }
}
