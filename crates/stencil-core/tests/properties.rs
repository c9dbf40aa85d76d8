//! Property tests for compilation invariants.

use proptest::prelude::*;
use stencil_core::{MemoryFilesystem, TemplateCompiler};

fn compiler() -> TemplateCompiler<MemoryFilesystem> {
    TemplateCompiler::new(MemoryFilesystem::new(), "/cache").unwrap()
}

/// Text with no directive, tag or host-code markers.
fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \t\r\n.,;:!?()\\[\\]}>$'\"=+*/_-]{0,200}"
}

fn directive_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,12}"
}

proptest! {
    #[test]
    fn directive_free_text_is_unchanged(text in plain_text()) {
        prop_assert_eq!(compiler().compile_string(&text), text);
    }

    #[test]
    fn escaped_directives_are_reproduced(name in directive_name(), args in "[a-z$ ,']{0,20}") {
        let compiler = compiler();
        prop_assert_eq!(
            compiler.compile_string(&format!("@@{}", name)),
            format!("@{}", name)
        );
        prop_assert_eq!(
            compiler.compile_string(&format!("@@{}({})", name, args)),
            format!("@{}({})", name, args)
        );
    }

    #[test]
    fn verbatim_bodies_are_byte_identical(body in "[a-z{}@ ()$\n]{0,80}") {
        prop_assume!(!body.contains("@endverbatim"));
        prop_assert_eq!(
            compiler().compile_string(&format!("@verbatim{}@endverbatim", body)),
            body
        );
    }

    /// Same identifier, same artifact, whatever else the compiler has seen.
    #[test]
    fn compiled_paths_are_deterministic(id in "\\PC{0,40}", other in "\\PC{0,40}") {
        let first = compiler();
        let second = compiler();
        second.compiled_path(&other);

        let path = first.compiled_path(&id);
        prop_assert_eq!(&path, &second.compiled_path(&id));

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        prop_assert_eq!(name.len(), 64 + ".php".len());
        prop_assert!(name.ends_with(".php"));
    }

    #[test]
    fn arbitrary_input_compiles(source in "\\PC{0,120}") {
        compiler().compile_string(&source);
    }

    /// Marker-dense input exercises every partial-match path in the scanner.
    #[test]
    fn arbitrary_markup_compiles(source in "[@{}!<?a-z() $-]{0,120}") {
        let compiled = compiler().compile_string(&source);
        if !source.contains(['@', '{', '<']) {
            prop_assert_eq!(compiled, source);
        }
    }
}
