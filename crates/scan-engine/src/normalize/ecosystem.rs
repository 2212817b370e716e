//! 패키지 관리자 이름 → 레지스트리 이름 정규화

/// (도구가 보고하는 이름, 레지스트리 이름)
///
/// 키는 소문자로 비교합니다.
const ECOSYSTEM_TABLE: &[(&str, &str)] = &[
    // JavaScript
    ("npm", "npm"),
    ("yarn", "npm"),
    ("pnpm", "npm"),
    ("node-pkg", "npm"),
    // Python
    ("pip", "pypi"),
    ("pipenv", "pypi"),
    ("poetry", "pypi"),
    ("python-pkg", "pypi"),
    ("uv", "pypi"),
    // JVM
    ("maven", "maven"),
    ("gradle", "maven"),
    ("jar", "maven"),
    ("pom", "maven"),
    ("sbt", "maven"),
    // Go
    ("go", "go"),
    ("gomod", "go"),
    ("gobinary", "go"),
    // PHP
    ("composer", "packagist"),
    // Rust
    ("cargo", "crates.io"),
    ("rust-binary", "crates.io"),
    // .NET
    ("nuget", "nuget"),
    ("dotnet-core", "nuget"),
    // Ruby
    ("gem", "rubygems"),
    ("bundler", "rubygems"),
    ("gemspec", "rubygems"),
];

/// 도구가 보고한 생태계 이름을 레지스트리 이름으로 바꿉니다.
///
/// 표에 없는 이름은 원래 값 그대로 돌려줍니다.
pub fn canonical_ecosystem(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    ECOSYSTEM_TABLE
        .iter()
        .find(|(source, _)| *source == key)
        .map_or_else(|| raw.to_owned(), |(_, registry)| (*registry).to_owned())
}
