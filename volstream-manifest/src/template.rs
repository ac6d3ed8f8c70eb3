use crate::ManifestError;

/// Expands `$RepresentationID$`, `$Number$`, `$Number%0Nd$` and `$$` in a media template.
pub fn expand_template(template: &str, representation: &str, number: u32) -> Result<String, ManifestError> {
    let error = |reason| ManifestError::Template {
        template: template.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('$').ok_or_else(|| error("unterminated identifier"))?;
        let identifier = &after[..end];

        match identifier {
            "" => out.push('$'),
            "RepresentationID" => out.push_str(representation),
            "Number" => out.push_str(&number.to_string()),
            _ => {
                let Some(format) = identifier.strip_prefix("Number%") else {
                    return Err(error("unknown identifier"));
                };
                let width = format
                    .strip_prefix('0')
                    .and_then(|f| f.strip_suffix('d'))
                    .and_then(|w| w.parse::<usize>().ok())
                    .ok_or_else(|| error("unsupported number format"))?;
                out.push_str(&format!("{:0width$}", number, width = width));
            }
        }

        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::expand_template;

    #[test]
    pub fn expands_identifiers() {
        let path = expand_template("$RepresentationID$/seg_$Number%05d$.vseg", "high", 42).unwrap();
        assert_eq!(path, "high/seg_00042.vseg");
        assert_eq!(expand_template("a$$b_$Number$", "x", 7).unwrap(), "a$b_7");
    }

    #[test]
    pub fn rejects_unknown_identifiers() {
        assert!(expand_template("$Time$.vseg", "x", 1).is_err());
        assert!(expand_template("$Number", "x", 1).is_err());
        assert!(expand_template("$Number%5x$", "x", 1).is_err());
    }
}
