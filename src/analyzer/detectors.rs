//! Detection tables.
//!
//! Language, framework, and license detection is pattern matching over file
//! trees; everything a detector knows lives in these tables. Extending
//! detection means adding rows, not logic.

/// File extension (without dot) to language name.
pub static LANGUAGE_BY_EXTENSION: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("go", "Go"),
    ("py", "Python"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("swift", "Swift"),
    ("c", "C"),
    ("h", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("cs", "C#"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("scala", "Scala"),
    ("hs", "Haskell"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("erl", "Erlang"),
    ("clj", "Clojure"),
    ("ml", "OCaml"),
    ("lua", "Lua"),
    ("r", "R"),
    ("dart", "Dart"),
    ("zig", "Zig"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("css", "CSS"),
    ("scss", "CSS"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
];

/// A dependency manifest the analyzer knows how to read.
pub struct ManifestRule {
    pub file: &'static str,
    pub package_manager: &'static str,
    /// Project type implied by the manifest's presence.
    pub project_type: &'static str,
}

pub static MANIFEST_RULES: &[ManifestRule] = &[
    ManifestRule {
        file: "Cargo.toml",
        package_manager: "cargo",
        project_type: "rust",
    },
    ManifestRule {
        file: "package.json",
        package_manager: "npm",
        project_type: "node",
    },
    ManifestRule {
        file: "go.mod",
        package_manager: "go",
        project_type: "go",
    },
    ManifestRule {
        file: "requirements.txt",
        package_manager: "pip",
        project_type: "python",
    },
    ManifestRule {
        file: "pyproject.toml",
        package_manager: "pip",
        project_type: "python",
    },
    ManifestRule {
        file: "pom.xml",
        package_manager: "maven",
        project_type: "java",
    },
    ManifestRule {
        file: "build.gradle",
        package_manager: "gradle",
        project_type: "java",
    },
    ManifestRule {
        file: "Gemfile",
        package_manager: "bundler",
        project_type: "ruby",
    },
    ManifestRule {
        file: "composer.json",
        package_manager: "composer",
        project_type: "php",
    },
];

/// Framework inferred from a dependency name appearing in a manifest.
pub struct FrameworkRule {
    pub dependency: &'static str,
    pub framework: &'static str,
    pub category: &'static str,
}

pub static FRAMEWORK_RULES: &[FrameworkRule] = &[
    FrameworkRule { dependency: "react", framework: "React", category: "frontend" },
    FrameworkRule { dependency: "vue", framework: "Vue.js", category: "frontend" },
    FrameworkRule { dependency: "svelte", framework: "Svelte", category: "frontend" },
    FrameworkRule { dependency: "next", framework: "Next.js", category: "frontend" },
    FrameworkRule { dependency: "express", framework: "Express", category: "backend" },
    FrameworkRule { dependency: "fastify", framework: "Fastify", category: "backend" },
    FrameworkRule { dependency: "django", framework: "Django", category: "backend" },
    FrameworkRule { dependency: "flask", framework: "Flask", category: "backend" },
    FrameworkRule { dependency: "fastapi", framework: "FastAPI", category: "backend" },
    FrameworkRule { dependency: "rails", framework: "Ruby on Rails", category: "backend" },
    FrameworkRule { dependency: "actix-web", framework: "Actix Web", category: "backend" },
    FrameworkRule { dependency: "axum", framework: "Axum", category: "backend" },
    FrameworkRule { dependency: "rocket", framework: "Rocket", category: "backend" },
    FrameworkRule { dependency: "tokio", framework: "Tokio", category: "runtime" },
    FrameworkRule { dependency: "laravel/framework", framework: "Laravel", category: "backend" },
    FrameworkRule { dependency: "spring-boot", framework: "Spring Boot", category: "backend" },
    FrameworkRule { dependency: "gin-gonic/gin", framework: "Gin", category: "backend" },
    FrameworkRule { dependency: "labstack/echo", framework: "Echo", category: "backend" },
    FrameworkRule { dependency: "pytorch", framework: "PyTorch", category: "ml" },
    FrameworkRule { dependency: "torch", framework: "PyTorch", category: "ml" },
    FrameworkRule { dependency: "tensorflow", framework: "TensorFlow", category: "ml" },
];

/// License identified by keywords in a license file.
pub struct LicenseRule {
    pub needles: &'static [&'static str],
    pub key: &'static str,
    pub name: &'static str,
    pub license_type: &'static str,
}

/// Filenames inspected for license text, first hit wins.
pub static LICENSE_FILES: &[&str] = &["LICENSE", "LICENSE.txt", "LICENSE.md", "COPYING", "LICENCE"];

pub static LICENSE_RULES: &[LicenseRule] = &[
    LicenseRule {
        needles: &["MIT License", "Permission is hereby granted, free of charge"],
        key: "mit",
        name: "MIT License",
        license_type: "permissive",
    },
    LicenseRule {
        needles: &["Apache License", "Version 2.0"],
        key: "apache-2.0",
        name: "Apache License 2.0",
        license_type: "permissive",
    },
    LicenseRule {
        needles: &["GNU GENERAL PUBLIC LICENSE", "Version 3"],
        key: "gpl-3.0",
        name: "GNU General Public License v3.0",
        license_type: "copyleft",
    },
    LicenseRule {
        needles: &["GNU GENERAL PUBLIC LICENSE", "Version 2"],
        key: "gpl-2.0",
        name: "GNU General Public License v2.0",
        license_type: "copyleft",
    },
    LicenseRule {
        needles: &["GNU LESSER GENERAL PUBLIC LICENSE"],
        key: "lgpl",
        name: "GNU Lesser General Public License",
        license_type: "copyleft",
    },
    LicenseRule {
        needles: &["Mozilla Public License", "2.0"],
        key: "mpl-2.0",
        name: "Mozilla Public License 2.0",
        license_type: "weak-copyleft",
    },
    LicenseRule {
        needles: &["BSD 3-Clause", "Redistribution and use in source and binary forms"],
        key: "bsd-3-clause",
        name: "BSD 3-Clause License",
        license_type: "permissive",
    },
    LicenseRule {
        needles: &["The Unlicense", "This is free and unencumbered software"],
        key: "unlicense",
        name: "The Unlicense",
        license_type: "public-domain",
    },
];

/// Map an extension to its language name, if known.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_lowercase();
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Match license text against the rule table. All needles of a rule must
/// appear; rules are ordered most specific first.
pub fn classify_license(text: &str) -> Option<&'static LicenseRule> {
    LICENSE_RULES
        .iter()
        .find(|rule| rule.needles.iter().all(|n| text.contains(n)))
}
