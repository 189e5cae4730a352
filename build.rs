use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output();

    let package_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();

    let version = match output {
        Ok(o) if o.status.success() => {
            let git_output = String::from_utf8(o.stdout)
                .unwrap_or_default()
                .trim()
                .to_string();

            // Only release tags (e.g. "v1.2.0") replace the package version
            match git_output.strip_prefix('v') {
                Some(tag) if !tag.is_empty() && !tag.ends_with("-dirty") => tag.to_string(),
                _ => package_version,
            }
        }
        _ => package_version,
    };

    println!("cargo:rustc-env=CLOUDLB_VERSION={}", version);
}
