//! Attribute-list declarations
//!
//! ```text
//! [52] AttlistDecl    ::= '<!ATTLIST' S Name AttDef* S? '>'
//! [53] AttDef         ::= S Name S AttType S DefaultDecl
//! [54] AttType        ::= StringType | TokenizedType | EnumeratedType
//! [58] NotationType   ::= 'NOTATION' S '(' S? Name (S? '|' S? Name)* S? ')'
//! [59] Enumeration    ::= '(' S? Nmtoken (S? '|' S? Nmtoken)* S? ')'
//! [60] DefaultDecl    ::= '#REQUIRED' | '#IMPLIED' | (('#FIXED' S)? AttValue)
//! ```
//!
//! Reference: https://www.w3.org/TR/xml/#attdecls

use crate::error::{Error, Result};
use crate::syntax::{Cursor, SyntaxError};

use super::declarations::{AttributeType, DefaultMode};

/// An attribute definition before its default value is normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    /// Attribute name
    pub name: String,
    /// Declared type
    pub attribute_type: AttributeType,
    /// Default declaration with the value exactly as written
    pub default: DefaultMode,
}

/// Split the body of an `<!ATTLIST>` declaration into attribute definitions.
///
/// `raw` is everything after the element name. Any syntax error rejects the
/// whole record.
pub fn parse_attribute_definitions(element: &str, raw: &str) -> Result<Vec<AttributeDefinition>> {
    let mut cursor = Cursor::new(raw);
    let mut definitions = Vec::new();

    loop {
        cursor.skip_whitespace();
        if cursor.is_at_end() {
            break;
        }
        let definition = parse_definition(&mut cursor).map_err(|err| {
            Error::AttributeList(format!(
                "element '{}': {} in '{}'",
                element,
                err,
                raw.trim()
            ))
        })?;
        definitions.push(definition);
    }

    Ok(definitions)
}

fn parse_definition(cursor: &mut Cursor<'_>) -> std::result::Result<AttributeDefinition, SyntaxError> {
    let name = cursor
        .read_name()
        .ok_or_else(|| cursor.error("expected an attribute name"))?
        .to_string();
    if cursor.skip_whitespace() == 0 {
        return Err(cursor.error(format!("whitespace required after attribute '{}'", name)));
    }

    let attribute_type = parse_attribute_type(cursor)?;
    if cursor.skip_whitespace() == 0 {
        return Err(cursor.error(format!("default declaration missing for attribute '{}'", name)));
    }

    let default = parse_default(cursor)?;

    if !cursor.is_at_end() && cursor.skip_whitespace() == 0 {
        return Err(cursor.error("whitespace required between attribute definitions"));
    }

    Ok(AttributeDefinition {
        name,
        attribute_type,
        default,
    })
}

fn parse_attribute_type(cursor: &mut Cursor<'_>) -> std::result::Result<AttributeType, SyntaxError> {
    if cursor.peek() == Some('(') {
        let values = parse_token_group(cursor, false)?;
        return Ok(AttributeType::Enumeration(values));
    }

    let keyword = cursor
        .read_name()
        .ok_or_else(|| cursor.error("expected an attribute type"))?;

    if keyword == "NOTATION" {
        if cursor.skip_whitespace() == 0 {
            return Err(cursor.error("whitespace required after 'NOTATION'"));
        }
        let names = parse_token_group(cursor, true)?;
        return Ok(AttributeType::Notation(names));
    }

    AttributeType::from_keyword(keyword)
        .ok_or_else(|| cursor.error(format!("unknown attribute type '{}'", keyword)))
}

/// `'(' token ('|' token)* ')'`, names only when `names` is set
fn parse_token_group(
    cursor: &mut Cursor<'_>,
    names: bool,
) -> std::result::Result<Vec<String>, SyntaxError> {
    cursor.expect_char('(')?;
    let mut values = Vec::new();

    loop {
        cursor.skip_whitespace();
        let token = if names {
            cursor.read_name()
        } else {
            cursor.read_nmtoken()
        };
        let token = token.ok_or_else(|| {
            cursor.error(if names {
                "expected a notation name"
            } else {
                "expected an enumeration token"
            })
        })?;
        values.push(token.to_string());

        cursor.skip_whitespace();
        match cursor.peek() {
            Some('|') => cursor.expect_char('|')?,
            Some(')') => {
                cursor.expect_char(')')?;
                break;
            }
            _ => return Err(cursor.error("expected '|' or ')'")),
        }
    }

    Ok(values)
}

fn parse_default(cursor: &mut Cursor<'_>) -> std::result::Result<DefaultMode, SyntaxError> {
    if cursor.eat_keyword("#REQUIRED") {
        return Ok(DefaultMode::Required);
    }
    if cursor.eat_keyword("#IMPLIED") {
        return Ok(DefaultMode::Implied);
    }
    if cursor.eat_keyword("#FIXED") {
        if cursor.skip_whitespace() == 0 {
            return Err(cursor.error("whitespace required after '#FIXED'"));
        }
        let value = cursor.read_quoted()?;
        return Ok(DefaultMode::Fixed(value.to_string()));
    }
    if matches!(cursor.peek(), Some('"' | '\'')) {
        let value = cursor.read_quoted()?;
        if value.contains('<') {
            return Err(cursor.error("'<' is not allowed in attribute values"));
        }
        return Ok(DefaultMode::Default(value.to_string()));
    }

    Err(cursor.error("expected '#REQUIRED', '#IMPLIED', '#FIXED' or a quoted default"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_definitions() {
        let defs = parse_attribute_definitions(
            "book",
            "\n  id ID #REQUIRED\n  lang NMTOKEN 'en'\n  version CDATA #FIXED \"1.0\"\n  note CDATA #IMPLIED",
        )
        .unwrap();

        assert_eq!(defs.len(), 4);
        assert_eq!(defs[0].name, "id");
        assert_eq!(defs[0].attribute_type, AttributeType::Id);
        assert_eq!(defs[0].default, DefaultMode::Required);
        assert_eq!(defs[1].default, DefaultMode::Default("en".into()));
        assert_eq!(defs[2].default, DefaultMode::Fixed("1.0".into()));
        assert_eq!(defs[3].default, DefaultMode::Implied);
    }

    #[test]
    fn test_enumerations_and_notations() {
        let defs = parse_attribute_definitions(
            "p",
            "align ( left | right|center ) \"left\" format NOTATION (gif|png) #IMPLIED",
        )
        .unwrap();

        assert_eq!(
            defs[0].attribute_type,
            AttributeType::Enumeration(vec!["left".into(), "right".into(), "center".into()])
        );
        assert_eq!(
            defs[1].attribute_type,
            AttributeType::Notation(vec!["gif".into(), "png".into()])
        );
    }

    #[test]
    fn test_empty_attlist() {
        assert!(parse_attribute_definitions("p", "   ").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_records() {
        for raw in [
            "id",
            "id ID",
            "id BOGUS #IMPLIED",
            "id ID #REQUIRE",
            "align (left|) 'left'",
            "align (left right) 'left'",
            "fmt NOTATION(gif) #IMPLIED",
            "x CDATA \"unterminated",
            "x CDATA 'a'y CDATA 'b'",
            "x CDATA '<b>'",
        ] {
            let err = parse_attribute_definitions("el", raw).unwrap_err();
            match err {
                Error::AttributeList(msg) => assert!(msg.contains("element 'el'"), "{}", msg),
                other => panic!("unexpected error {:?} for {:?}", other, raw),
            }
        }
    }
}
