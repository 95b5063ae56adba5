//! Throwaway source repositories for pipeline tests.

use std::path::Path;

use git2::{IndexAddOption, Repository, Signature};

/// Create a repository at `path` with `files` committed on its default
/// branch and return a `file://` URL for it.
pub fn fixture_repo(path: &Path, files: &[(&str, &str)]) -> String {
    std::fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();

    for (name, content) in files {
        let file = path.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = Signature::now("Test User", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])
        .unwrap();

    url::Url::from_directory_path(path).unwrap().to_string()
}

/// A static site whose build copies `index.html` into `dist/`.
pub fn static_site(path: &Path, body: &str) -> String {
    fixture_repo(
        path,
        &[
            ("package.json", r#"{"name":"fixture","scripts":{"build":"true"}}"#),
            ("index.html", body),
            ("assets/app.js", "console.log('hi')"),
        ],
    )
}

/// Build command matching [`static_site`].
pub const STATIC_BUILD: &str = "mkdir -p dist/assets && cp index.html dist/ && cp assets/app.js dist/assets/";
