use proptest::prelude::*;
use portico_runtime::{resolve, SandboxError};

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        "[a-z]{1,6}\\.(js|css)",
        "[a-z]{0,4}\\*[a-z]{0,4}\\.js",
        Just("..".to_string()),
    ]
}

proptest! {
    #[test]
    fn traversal_never_resolves(
        before in prop::collection::vec(segment(), 0..4),
        after in prop::collection::vec(segment(), 0..4),
    ) {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.js"), "x").unwrap();

        let mut segments = before;
        segments.push("..".to_string());
        segments.extend(after);
        let input = segments.join("/");

        let result = resolve(&input, root.path());
        prop_assert!(
            matches!(result, Err(SandboxError::Traversal { .. })),
            "input {input:?} gave {result:?}"
        );
    }

    #[test]
    fn absolute_never_resolves(
        segments in prop::collection::vec(segment(), 1..5),
        backslash in any::<bool>(),
    ) {
        let root = tempfile::tempdir().unwrap();
        let separator = if backslash { "\\" } else { "/" };
        let input = format!("{separator}{}", segments.join(separator));

        let result = resolve(&input, root.path());
        prop_assert!(
            matches!(result, Err(SandboxError::Absolute { .. })),
            "input {input:?} gave {result:?}"
        );
    }

    #[test]
    fn successful_resolution_stays_inside_root(name in "[a-z]{1,8}", glob in any::<bool>()) {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join(format!("{name}.js")), "x").unwrap();

        let input = if glob { "dist/*.js".to_string() } else { format!("dist/{name}.js") };
        let resolved = resolve(&input, root.path()).unwrap();
        let canonical_root = root.path().canonicalize().unwrap();
        prop_assert!(resolved.starts_with(&canonical_root));
        prop_assert!(resolved.is_file());
    }
}
