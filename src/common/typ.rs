use std::fmt;

/// A PCL type
///
/// The target of a [`Type::Pointer`] is `None` for the literal `nil`, whose
/// pointee is only discovered when the pointer is first compared or assigned.
/// [`same_type`] and [`compatible`] resolve it in place, which is why both
/// relations take their operands mutably.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Integer,
    Real,
    Boolean,
    Char,
    Array { size: usize, elem: Box<Type> },
    IArray { elem: Box<Type> },
    Pointer { target: Option<Box<Type>> },
}

impl Type {
    pub fn array(size: usize, elem: Type) -> Self {
        Type::Array {
            size,
            elem: Box::new(elem),
        }
    }

    pub fn iarray(elem: Type) -> Self {
        Type::IArray {
            elem: Box::new(elem),
        }
    }

    pub fn pointer(target: Type) -> Self {
        Type::Pointer {
            target: Some(Box::new(target)),
        }
    }

    /// The type of `nil` before it is unified against a pointer
    pub fn nil() -> Self {
        Type::Pointer { target: None }
    }

    /// Every type except the open array is complete
    pub fn is_complete(&self) -> bool {
        !matches!(self, Type::IArray { .. })
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Integer | Type::Real)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. } | Type::IArray { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "Integer"),
            Type::Real => write!(f, "Real"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Char => write!(f, "Char"),
            Type::Array { size, elem } => write!(f, "Array with size {size} of {elem}"),
            Type::IArray { elem } => write!(f, "Array of {elem}"),
            Type::Pointer { target: Some(t) } => write!(f, "Pointer to {t}"),
            Type::Pointer { target: None } => write!(f, "Pointer to nil"),
        }
    }
}

/// Whether two types may be compared with `=` and `<>`
///
/// Both operands must have the same variant; pointer targets are compared
/// recursively, with an unresolved `nil` unifying against (and taking over)
/// the other side's target. Arrays never compare equal.
pub fn same_type(left: &mut Type, right: &mut Type) -> bool {
    match (left, right) {
        (Type::Integer, Type::Integer)
        | (Type::Real, Type::Real)
        | (Type::Boolean, Type::Boolean)
        | (Type::Char, Type::Char) => true,
        (Type::Pointer { target: left }, Type::Pointer { target: right }) => {
            match (left, right) {
                (Some(left), Some(right)) => same_type(left, right),
                (None, None) => true,
                (left, right) => {
                    // one side is an unresolved nil; fill it from the other
                    if left.is_none() {
                        *left = right.clone();
                    } else {
                        *right = left.clone();
                    }
                    true
                }
            }
        }
        _ => false,
    }
}

/// Whether `src` may be assigned (or passed by value) to a `dst`
///
/// On top of [`same_type`], an `Integer` fits into a `Real` and a sized
/// array fits into an open array of the same element type. Pointer targets
/// recurse through `compatible`, so `^array of t` also accepts a
/// `^array [n] of t`.
pub fn compatible(dst: &mut Type, src: &mut Type) -> bool {
    match (dst, src) {
        (Type::Real, Type::Integer) => true,
        (Type::IArray { elem: dst }, Type::Array { elem: src, .. })
        | (Type::IArray { elem: dst }, Type::IArray { elem: src }) => same_type(dst, src),
        (
            Type::Array {
                size: dst_size,
                elem: dst,
            },
            Type::Array {
                size: src_size,
                elem: src,
            },
        ) => dst_size == src_size && same_type(dst, src),
        (Type::Pointer { target: dst }, Type::Pointer { target: src }) => match (dst, src) {
            (Some(dst), Some(src)) => compatible(dst, src),
            (None, None) => true,
            (dst, src) => {
                if src.is_none() {
                    *src = dst.clone();
                } else {
                    *dst = src.clone();
                }
                true
            }
        },
        (dst, src) => same_type(dst, src),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_reflexive_and_symmetric() {
        let types = [
            Type::Integer,
            Type::Real,
            Type::Boolean,
            Type::Char,
            Type::pointer(Type::Integer),
            Type::pointer(Type::pointer(Type::Char)),
        ];

        for t in &types {
            assert!(same_type(&mut t.clone(), &mut t.clone()), "{t}");
        }

        for a in &types {
            for b in &types {
                assert_eq!(
                    same_type(&mut a.clone(), &mut b.clone()),
                    same_type(&mut b.clone(), &mut a.clone()),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn arrays_are_never_same() {
        let mut a = Type::array(3, Type::Integer);
        let mut b = Type::array(3, Type::Integer);
        assert!(!same_type(&mut a, &mut b));

        let mut a = Type::iarray(Type::Char);
        let mut b = Type::iarray(Type::Char);
        assert!(!same_type(&mut a, &mut b));
    }

    #[test]
    fn integer_fits_into_real_but_not_back() {
        assert!(compatible(&mut Type::Real, &mut Type::Integer));
        assert!(!compatible(&mut Type::Integer, &mut Type::Real));
    }

    #[test]
    fn sized_array_fits_into_open_array_but_not_back() {
        let mut open = Type::iarray(Type::Integer);
        let mut sized = Type::array(10, Type::Integer);
        assert!(compatible(&mut open, &mut sized));
        assert!(!compatible(&mut sized, &mut open));
    }

    #[test]
    fn pointer_to_sized_array_fits_into_pointer_to_open_array() {
        let mut dst = Type::pointer(Type::iarray(Type::Char));
        let mut src = Type::pointer(Type::array(4, Type::Char));
        assert!(compatible(&mut dst, &mut src));
    }

    #[test]
    fn nil_resolution_is_idempotent() {
        let mut nil = Type::nil();
        let mut p_int = Type::pointer(Type::Integer);

        assert!(compatible(&mut p_int, &mut nil));
        assert_eq!(nil, Type::pointer(Type::Integer));

        // unifying again against the same target still succeeds
        assert!(compatible(&mut p_int, &mut nil));
        assert_eq!(nil, Type::pointer(Type::Integer));

        // but the target is now fixed
        let mut p_char = Type::pointer(Type::Char);
        assert!(!compatible(&mut p_char, &mut nil));
    }

    #[test]
    fn nil_compares_against_any_pointer() {
        let mut nil = Type::nil();
        let mut p = Type::pointer(Type::pointer(Type::Real));
        assert!(same_type(&mut p, &mut nil));
        assert_eq!(nil, p);
    }

    #[test]
    fn completeness() {
        assert!(Type::Integer.is_complete());
        assert!(Type::array(2, Type::Real).is_complete());
        assert!(Type::pointer(Type::iarray(Type::Char)).is_complete());
        assert!(!Type::iarray(Type::Char).is_complete());
    }
}
