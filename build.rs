use std::process::Command;

/// Stdout of a successful git invocation, trimmed.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=STOREIMG_BUILD_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    // Source tarballs have no .git; packagers pass the hash in.
    let hash = std::env::var("STOREIMG_BUILD_HASH")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            let hash = git(&["rev-parse", "--short=10", "HEAD"])?;
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|s| !s.is_empty());
            Some(if dirty { format!("{hash}-dirty") } else { hash })
        })
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={hash}");
}
