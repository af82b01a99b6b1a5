use enumflags2::BitFlags;
use std::fmt;
use std::rc::Rc;


// Abstract over various memory management strategies.
pub type Node<T> = Rc<T>;
pub type Seq<T> = Vec<Node<T>>;


// Arithmetic, relational, and logic operations
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    And,
    Or,
}


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UnOp {
    Not,
    Neg,
}


// The two source-level types.
//
// Represented as bit flags so that diagnostics can carry an
// "expected one of" set.
#[derive(BitFlags, Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum TypeTag {
    Int  = 0b01,
    Bool = 0b10,
}


// ADT for expressions
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i32),
    Bool(bool),
    Id(String),
    BinOp(BinOp, Node<Expr>, Node<Expr>),
    UnOp(UnOp, Node<Expr>),
}


// ADT for statements
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Declare(TypeTag, String, Option<Node<Expr>>),
    Assign(String, Node<Expr>),
    If(Node<Expr>, Seq<Statement>, Option<Seq<Statement>>),
    While(Node<Expr>, Seq<Statement>),
    Print(Node<Expr>),
}


// ADT for programs
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub code: Seq<Statement>,
}


impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt  => "<",
            BinOp::Gt  => ">",
            BinOp::Lte => "<=",
            BinOp::Gte => ">=",
            BinOp::Eq  => "==",
            BinOp::Neq => "!=",
            BinOp::And => "&&",
            BinOp::Or  => "||",
        }
    }
}


impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Not => "!",
            UnOp::Neg => "-",
        }
    }
}


impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}


impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}


impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeTag::Int => f.write_str("int"),
            TypeTag::Bool => f.write_str("bool"),
        }
    }
}


// Shorthand constructors, mainly for tests.

pub fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
    Expr::BinOp(op, Node::new(l), Node::new(r))
}

pub fn un(op: UnOp, operand: Expr) -> Expr {
    Expr::UnOp(op, Node::new(operand))
}

pub fn id(name: &str) -> Expr {
    Expr::Id(String::from(name))
}
