//! Helpers for JVM internal names and descriptors as they appear in Symbol text.

/// `Lorg/acme/Thing;` -> `org.acme.Thing`, `[Lorg/acme/Thing;` -> `[Lorg.acme.Thing;`.
pub fn class_name_from_symbol(symbol: &str) -> String {
    let dotted = symbol.trim().replace('/', ".");
    match dotted.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(inner) => inner.to_string(),
        None => dotted,
    }
}

/// `org.acme.Thing` -> `org/acme/Thing`.
pub fn slash_name(class_name: &str) -> String {
    class_name.trim().replace('.', "/")
}

/// Splits `(params)ret` into its parameter list and return type.
pub fn split_method_descriptor(descriptor: &str) -> Option<(&str, &str)> {
    let rest = descriptor.trim().strip_prefix('(')?;
    let close = rest.rfind(')')?;
    Some((&rest[..close], &rest[close + 1..]))
}

/// Parameter types of a descriptor parameter list, in order. Reference types keep
/// their `L…;` form (including any generic arguments and array prefix); primitive
/// arrays are kept, plain primitives are skipped.
pub fn parameter_types(params: &str) -> Vec<String> {
    let bytes = params.as_bytes();
    let mut types = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] == b'[' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'L' {
            let mut depth = 0usize;
            while i < bytes.len() {
                match bytes[i] {
                    b'<' => depth += 1,
                    b'>' => depth = depth.saturating_sub(1),
                    b';' if depth == 0 => break,
                    _ => {}
                }
                i += 1;
            }
            let end = (i + 1).min(bytes.len());
            types.push(params[start..end].to_string());
            i = end;
        } else {
            i += 1;
            if i - start > 1 {
                types.push(params[start..i].to_string());
            }
        }
    }
    types
}

/// Every class mentioned by a generic signature such as
/// `Ljava/util/function/Supplier<Ljavax/script/ScriptEngine;>;`, in dotted form.
pub fn generic_class_names(signature: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for piece in signature.split(['<', '>', ';']) {
        let piece = piece.trim().trim_start_matches(['+', '-', '*']);
        let piece = piece.strip_prefix('L').unwrap_or(piece);
        if piece.is_empty() {
            continue;
        }
        let name = piece.replace('/', ".");
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_symbol_names() {
        assert_eq!(
            class_name_from_symbol("Lorg/aspectj/weaver/ast/ASTNode;"),
            "org.aspectj.weaver.ast.ASTNode"
        );
        assert_eq!(
            class_name_from_symbol("[Lcom/fasterxml/jackson/databind/JsonSerializable;"),
            "[Lcom.fasterxml.jackson.databind.JsonSerializable;"
        );
        assert_eq!(
            class_name_from_symbol("java/lang/invoke/LambdaForm$DMH"),
            "java.lang.invoke.LambdaForm$DMH"
        );
    }

    #[test]
    fn splits_descriptor() {
        assert_eq!(
            split_method_descriptor("(Lsun/nio/fs/UnixSecureDirectoryStream;)V"),
            Some(("Lsun/nio/fs/UnixSecureDirectoryStream;", "V"))
        );
        assert_eq!(
            split_method_descriptor("()Ljavax/net/ssl/SSLServerSocketFactory;"),
            Some(("", "Ljavax/net/ssl/SSLServerSocketFactory;"))
        );
        assert_eq!(split_method_descriptor("java/lang/Object"), None);
    }

    #[test]
    fn scans_parameters() {
        assert_eq!(
            parameter_types("Ljava/lang/Object;Ljava/lang/Object;DJ"),
            vec!["Ljava/lang/Object;", "Ljava/lang/Object;"]
        );
        assert_eq!(
            parameter_types("I[Ljava/lang/String;[[B"),
            vec!["[Ljava/lang/String;", "[[B"]
        );
    }

    #[test]
    fn scans_generic_parameters_as_one_type() {
        assert_eq!(
            parameter_types("Ljava/util/function/Supplier<Ljavax/script/ScriptEngine;>;Z"),
            vec!["Ljava/util/function/Supplier<Ljavax/script/ScriptEngine;>;"]
        );
    }

    #[test]
    fn lists_generic_classes() {
        assert_eq!(
            generic_class_names("Ljava/util/function/Supplier<Ljavax/script/ScriptEngine;>;"),
            vec!["java.util.function.Supplier", "javax.script.ScriptEngine"]
        );
        assert_eq!(
            generic_class_names("Ljava/util/List<+Ljava/lang/Number;>;"),
            vec!["java.util.List", "java.lang.Number"]
        );
    }
}
