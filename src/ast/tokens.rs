use std::fmt;

/// Tag identifying a verb or a terminal reference.
///
/// The discriminant of every token indexes the static descriptor table in
/// [`crate::ast::verbs`], so the declaration order here and the table order
/// must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    /// Boolean conjunction of two or more operands, returns the first falsy one
    And,
    /// Boolean disjunction of two or more operands, returns the first truthy one
    Or,
    Not,
    /// `cond.ternary(then, otherwise)`
    Ternary,
    /// Navigation into an object field or array index
    Get,

    /// The root of the data model
    Root,

    MapValues,
    Map,
    Any,
    KeyBy,
    Filter,
    AnyValues,
    FilterBy,
    MapKeys,
    GroupBy,
    Values,
    Keys,
    Assign,
    Defaults,
    Range,
    Size,

    /// Context value handed to a lambda by its collection verb
    Context,
    /// Lambda marker (only valid as the callback operand of a collection verb)
    Func,
    /// Current element inside a lambda
    Val,
    /// Current key (index or field name) inside a lambda
    Key,
    /// First setter argument
    Arg0,
    /// Second setter argument
    Arg1,
    /// Internal marker for declared outputs
    TopLevel,

    // Comparison
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,

    // Arithmetic
    Plus,
    Minus,
    Mult,
    Div,
    Mod,

    /// Invocation of an externally supplied library function
    Call,

    /// Internal path wildcard
    Wildcard,
}

impl Token {
    pub const COUNT: usize = 40;

    /// Every token, in discriminant order.
    pub const ALL: [Token; Token::COUNT] = [
        Token::And,
        Token::Or,
        Token::Not,
        Token::Ternary,
        Token::Get,
        Token::Root,
        Token::MapValues,
        Token::Map,
        Token::Any,
        Token::KeyBy,
        Token::Filter,
        Token::AnyValues,
        Token::FilterBy,
        Token::MapKeys,
        Token::GroupBy,
        Token::Values,
        Token::Keys,
        Token::Assign,
        Token::Defaults,
        Token::Range,
        Token::Size,
        Token::Context,
        Token::Func,
        Token::Val,
        Token::Key,
        Token::Arg0,
        Token::Arg1,
        Token::TopLevel,
        Token::Eq,
        Token::Gt,
        Token::Lt,
        Token::Gte,
        Token::Lte,
        Token::Plus,
        Token::Minus,
        Token::Mult,
        Token::Div,
        Token::Mod,
        Token::Call,
        Token::Wildcard,
    ];

    /// The camelCase name used in the token form and the JSON model format.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Looks a token up by its camelCase name.
    pub fn from_name(name: &str) -> Option<Token> {
        Token::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
