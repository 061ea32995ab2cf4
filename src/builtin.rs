//! The PCL runtime library
//!
//! Prototype definitions for the I/O, math and allocation helpers the
//! runtime provides. The semantic analyzer seeds the outermost scope from
//! this table and the code generator declares the matching externs, so the
//! two passes can never disagree about a signature.

use crate::Type;

/// Signature of one runtime function
pub struct LibraryFunction {
    /// Name visible to PCL programs
    pub name: &'static str,
    /// Symbol the runtime exports
    ///
    /// Differs from `name` only where the obvious symbol would collide with
    /// a libm function of another type (`trunc`, `round`).
    pub symbol: &'static str,
    /// Parameters as (pass-by-reference, type) pairs
    pub parameters: Vec<(bool, Type)>,
    /// `None` for procedures
    pub return_type: Option<Type>,
}

impl LibraryFunction {
    fn new(
        name: &'static str,
        symbol: &'static str,
        parameters: Vec<(bool, Type)>,
        return_type: Option<Type>,
    ) -> Self {
        Self {
            name,
            symbol,
            parameters,
            return_type,
        }
    }
}

/// A string buffer parameter: a by-reference open array of characters
fn string_buffer() -> (bool, Type) {
    (true, Type::iarray(Type::Char))
}

/// Every function of the PCL runtime library, in declaration order
pub fn library_functions() -> Vec<LibraryFunction> {
    use Type::{Boolean, Char, Integer, Real};

    vec![
        LibraryFunction::new("writeInteger", "writeInteger", vec![(false, Integer)], None),
        LibraryFunction::new("writeBoolean", "writeBoolean", vec![(false, Boolean)], None),
        LibraryFunction::new("writeChar", "writeChar", vec![(false, Char)], None),
        LibraryFunction::new("writeReal", "writeReal", vec![(false, Real)], None),
        LibraryFunction::new("writeString", "writeString", vec![string_buffer()], None),
        LibraryFunction::new("readInteger", "readInteger", vec![], Some(Integer)),
        LibraryFunction::new("readBoolean", "readBoolean", vec![], Some(Boolean)),
        LibraryFunction::new("readChar", "readChar", vec![], Some(Char)),
        LibraryFunction::new("readReal", "readReal", vec![], Some(Real)),
        LibraryFunction::new(
            "readString",
            "readString",
            vec![(false, Integer), string_buffer()],
            None,
        ),
        LibraryFunction::new("abs", "abs", vec![(false, Integer)], Some(Integer)),
        LibraryFunction::new("fabs", "fabs", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("sqrt", "sqrt", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("sin", "sin", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("cos", "cos", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("tan", "tan", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("arctan", "arctan", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("exp", "exp", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("ln", "ln", vec![(false, Real)], Some(Real)),
        LibraryFunction::new("pi", "pi", vec![], Some(Real)),
        LibraryFunction::new("trunc", "trunc_", vec![(false, Real)], Some(Integer)),
        LibraryFunction::new("round", "round_", vec![(false, Real)], Some(Integer)),
        LibraryFunction::new("ord", "ord", vec![(false, Char)], Some(Integer)),
        LibraryFunction::new("chr", "chr", vec![(false, Integer)], Some(Char)),
    ]
}
