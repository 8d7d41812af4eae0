//! String-encoded type names
//!
//! Grammar: `TopLevelName ('`' Arity)? ('[' Arg (',' Arg)* ']')?` where
//! each `Arg` recurses into the same grammar. The bracket section is
//! split at depth zero only, so generic arguments may themselves be
//! generic. Parsing is a pure function from string to AST; resolution
//! against module metadata happens elsewhere.

use std::fmt;

/// Parsed form of a string-encoded type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Top-level (dotted) name
    pub name: String,
    /// Declared generic arity, when spelled explicitly
    pub arity: Option<u16>,
    /// Generic arguments, empty for non-generic names
    pub args: Vec<TypeName>,
}

/// Type-name parse errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeNameError {
    /// The input or an argument position was empty
    Empty,
    /// The arity section is not a number
    InvalidArity(String),
    /// Brackets are unbalanced
    UnbalancedBrackets,
    /// Text follows the closing bracket
    TrailingInput(String),
}

impl fmt::Display for TypeNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNameError::Empty => write!(f, "empty type name"),
            TypeNameError::InvalidArity(s) => write!(f, "invalid arity '{s}'"),
            TypeNameError::UnbalancedBrackets => write!(f, "unbalanced brackets"),
            TypeNameError::TrailingInput(s) => write!(f, "trailing input '{s}'"),
        }
    }
}

/// Parse a string-encoded type name
pub fn parse_type_name(input: &str) -> Result<TypeName, TypeNameError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TypeNameError::Empty);
    }

    // Split off the bracket section at depth zero
    let (head, args) = match input.find('[') {
        None => {
            if input.contains(']') {
                return Err(TypeNameError::UnbalancedBrackets);
            }
            (input, Vec::new())
        }
        Some(open) => {
            let close = matching_bracket(input, open)?;
            let rest = input[close + 1..].trim();
            if !rest.is_empty() {
                return Err(TypeNameError::TrailingInput(rest.to_string()));
            }
            let inner = &input[open + 1..close];
            let mut args = Vec::new();
            for piece in split_top_level(inner)? {
                args.push(parse_type_name(piece)?);
            }
            if args.is_empty() {
                return Err(TypeNameError::Empty);
            }
            (&input[..open], args)
        }
    };

    // Split off the explicit arity, if any
    let (name, arity) = match head.find('`') {
        None => (head.trim(), None),
        Some(tick) => {
            let digits = head[tick + 1..].trim();
            let arity = digits
                .parse::<u16>()
                .map_err(|_| TypeNameError::InvalidArity(digits.to_string()))?;
            (head[..tick].trim(), Some(arity))
        }
    };

    if name.is_empty() {
        return Err(TypeNameError::Empty);
    }

    Ok(TypeName {
        name: name.to_string(),
        arity,
        args,
    })
}

/// Index of the `]` matching the `[` at `open`
fn matching_bracket(input: &str, open: usize) -> Result<usize, TypeNameError> {
    let mut depth = 0usize;
    // `open` is a byte index, so slice rather than skip char positions
    for (i, c) in input[open..].char_indices().map(|(i, c)| (open + i, c)) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(TypeNameError::UnbalancedBrackets)
}

/// Split a comma-separated argument list at bracket depth zero
fn split_top_level(input: &str) -> Result<Vec<&str>, TypeNameError> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                if depth == 0 {
                    return Err(TypeNameError::UnbalancedBrackets);
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                pieces.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TypeNameError::UnbalancedBrackets);
    }
    pieces.push(input[start..].trim());
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> TypeName {
        TypeName {
            name: s.to_string(),
            arity: None,
            args: Vec::new(),
        }
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(parse_type_name("lib.Widget").unwrap(), name("lib.Widget"));
    }

    #[test]
    fn test_builtin_name() {
        assert_eq!(parse_type_name("int").unwrap(), name("int"));
    }

    #[test]
    fn test_generic_instantiation() {
        let parsed = parse_type_name("util.List[int]").unwrap();
        assert_eq!(parsed.name, "util.List");
        assert_eq!(parsed.args, vec![name("int")]);
    }

    #[test]
    fn test_multi_argument() {
        let parsed = parse_type_name("util.Map[str, int]").unwrap();
        assert_eq!(parsed.args, vec![name("str"), name("int")]);
    }

    #[test]
    fn test_nested_generic_argument() {
        let parsed = parse_type_name("util.List[util.Map[str,int]]").unwrap();
        assert_eq!(parsed.args.len(), 1);
        assert_eq!(parsed.args[0].name, "util.Map");
        assert_eq!(parsed.args[0].args, vec![name("str"), name("int")]);
    }

    #[test]
    fn test_multibyte_name_before_bracket() {
        let parsed = parse_type_name("café.Liste[int]").unwrap();
        assert_eq!(parsed.name, "café.Liste");
        assert_eq!(parsed.args, vec![name("int")]);
        assert_eq!(
            parse_type_name("café.Liste[int"),
            Err(TypeNameError::UnbalancedBrackets)
        );
    }

    #[test]
    fn test_explicit_arity() {
        let parsed = parse_type_name("util.Map`2[str,int]").unwrap();
        assert_eq!(parsed.arity, Some(2));
        assert_eq!(parsed.args.len(), 2);
    }

    #[test]
    fn test_invalid_arity() {
        assert_eq!(
            parse_type_name("util.Map`x[str,int]"),
            Err(TypeNameError::InvalidArity("x".to_string()))
        );
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert_eq!(
            parse_type_name("util.List[int"),
            Err(TypeNameError::UnbalancedBrackets)
        );
        assert_eq!(
            parse_type_name("util.List]int["),
            Err(TypeNameError::UnbalancedBrackets)
        );
    }

    #[test]
    fn test_trailing_input() {
        assert!(matches!(
            parse_type_name("util.List[int]x"),
            Err(TypeNameError::TrailingInput(_))
        ));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(parse_type_name(""), Err(TypeNameError::Empty));
        assert_eq!(parse_type_name("util.List[]"), Err(TypeNameError::Empty));
        assert_eq!(parse_type_name("util.List[int,]"), Err(TypeNameError::Empty));
    }
}
