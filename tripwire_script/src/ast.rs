//! Abstract syntax tree for Tripwire scripts.
//!
//! Nodes are immutable once built and structurally comparable, so compiling
//! the same source twice yields equal trees. Nodes that can fail at runtime
//! carry their 1-based source line for diagnostics.

/// A literal constant embedded in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

/// Binary operators, lowest-to-highest precedence tiers documented in
/// [`crate::parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Assignment flavor: plain `=` or the compound forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// What an assignment writes to: a local/lexical variable or a `$global`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Ident(String),
    Global(String),
}

/// A node in the script AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Literal),
    /// Bare identifier; resolved at runtime against the scope chain, then the
    /// placeholder table (names are late-bound by the host).
    Ident { name: String, line: usize },
    /// `$name` -- direct access to the shared global store.
    Global { name: String, line: usize },
    /// Dotted placeholder/property access such as `player.name`, optionally
    /// with function-style arguments.
    Placeholder {
        path: String,
        args: Vec<Node>,
        line: usize,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Node>,
        line: usize,
    },
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Box<Node>,
        line: usize,
    },
    /// `#NAME:a:b` / `#NAME(a, b)` -- both syntaxes parse to this shape.
    ExecCall {
        name: String,
        args: Vec<Node>,
        line: usize,
    },
    /// `CALL <expr>` -- invoke a named sub-trigger.
    SubCall { name: Box<Node>, line: usize },
    /// `COOLDOWN <expr>` -- extend the acting entity's cooldown, in seconds.
    Cooldown { seconds: Box<Node>, line: usize },
    /// `IMPORT a.b.c` -- accepted for compatibility, ignored at runtime.
    Import { path: String, line: usize },
    /// Ordered statement sequence.
    Block(Vec<Node>),
    /// `IF` / `ELSEIF`* / `ELSE`? / `ENDIF`; arms are (condition, body).
    If {
        arms: Vec<(Node, Node)>,
        else_body: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
        line: usize,
    },
    /// `FOR i = start:stop` iterates integers in `[start, stop)`.
    For {
        var: String,
        start: Box<Node>,
        stop: Box<Node>,
        body: Box<Node>,
        line: usize,
    },
    Break { line: usize },
    Continue { line: usize },
}

/// A parsed script: its statement block plus source-level directives.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Node,
    /// True when the script opened with a `SYNC` directive, asking to run on
    /// the caller's thread regardless of the trigger default.
    pub sync_hint: bool,
}
