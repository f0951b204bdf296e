fn main() {
    feature_conflicts();

    let version = get_version();
    println!("cargo:rustc-env=VERSION={}", version);
    println!("cargo:warning=Feature tagged version: {}", version);

    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DB_MYSQL");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DB_SQLITE");
    println!("cargo:rerun-if-changed=build.rs");
}

fn feature_conflicts() {

    // Database.
    let mysql = std::env::var_os("CARGO_FEATURE_DB_MYSQL").is_some();
    let sqlite = std::env::var_os("CARGO_FEATURE_DB_SQLITE").is_some();
    if !mysql && !sqlite {
        panic!("At least one database backend feature must be enabled!");
    }
    if !mysql {
        println!("cargo:warning=Built without 'db-mysql', only SQLite outbox URLs will connect.");
    }
}

fn get_version() -> String {
    let mut suffixes = Vec::new();
    if std::env::var_os("CARGO_FEATURE_DB_MYSQL").is_some() {
        suffixes.push("mysql");
    }
    if std::env::var_os("CARGO_FEATURE_DB_SQLITE").is_some() {
        suffixes.push("sqlite");
    }

    let version = env!("CARGO_PKG_VERSION");
    if suffixes.is_empty() {
        version.to_string()
    } else {
        format!("{}+{}", version, suffixes.join("."))
    }
}
