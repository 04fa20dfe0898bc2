use extindex_core::{
    Bucket, ClassPath, ClassPathEntry, CollectingDiagnostics, Diagnostics, ExtensionFinder,
    IndexSettings, ResourceLoader, ResourceLocation, ScopeKey, ScopeRegistry, StorageLayout,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::SimpleFileOptions;

const INDEX: &str = "META-INF/extensions.idx";

fn write_dir_index(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn write_archive(path: &Path, files: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, text) in files {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(text.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

fn bucket(values: &[&str]) -> Bucket {
    values.iter().map(|value| value.to_string()).collect()
}

fn finder(settings: IndexSettings) -> (ExtensionFinder, Arc<CollectingDiagnostics>) {
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let sink: Arc<dyn Diagnostics> = diagnostics.clone();
    (ExtensionFinder::new(settings, sink), diagnostics)
}

fn dir(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(&path).unwrap();
    path
}

#[test]
fn scopes_are_isolated_between_host_and_plugin() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    let plugin_dir = dir(temp.path(), "plugin");
    write_dir_index(&host_dir, INDEX, "# Generated\ncom.host.A\n");
    write_dir_index(&plugin_dir, INDEX, "# Generated\ncom.plugin.B\n");

    let host: Arc<dyn ResourceLoader> = Arc::new(ClassPath::new().path(&host_dir));
    let plugin = ClassPath::with_parent(host.clone()).path(&plugin_dir);
    let mut registry = ScopeRegistry::new();
    registry.register("p", Arc::new(plugin)).unwrap();

    let (finder, diagnostics) = finder(IndexSettings::default());
    let global = finder.discover_global(host.as_ref());
    let plugins = finder.discover_per_plugin(&registry);

    assert_eq!(global.len(), 1);
    assert_eq!(global.global_entries().unwrap(), &bucket(&["com.host.A"]));
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins.entries_for_plugin("p").unwrap(), &bucket(&["com.plugin.B"]));
    assert!(diagnostics.is_empty());
}

#[test]
fn missing_resource_yields_empty_bucket_without_diagnostics() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    let empty_plugin = dir(temp.path(), "empty");
    let missing_archive = temp.path().join("missing.jar");

    let host = ClassPath::new().path(&host_dir);
    let mut registry = ScopeRegistry::new();
    registry
        .register("empty", Arc::new(ClassPath::new().path(&empty_plugin).path(&missing_archive)))
        .unwrap();

    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover(&host, &registry);

    assert_eq!(index.len(), 2);
    assert!(index.global_entries().unwrap().is_empty());
    assert!(index.entries_for_plugin("empty").unwrap().is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn combined_result_keeps_global_first_then_registry_order() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    write_dir_index(&host_dir, INDEX, "com.host.A\n");

    let mut registry = ScopeRegistry::new();
    for id in ["zeta", "alpha", "mid"] {
        let plugin_dir = dir(temp.path(), id);
        write_dir_index(&plugin_dir, INDEX, &format!("com.{id}.Ext\n"));
        registry
            .register(id, Arc::new(ClassPath::new().path(&plugin_dir)))
            .unwrap();
    }

    for parallel in [false, true] {
        let settings = IndexSettings {
            parallel_discovery: parallel,
            ..IndexSettings::default()
        };
        let (finder, _) = finder(settings);
        let index = finder.discover(&ClassPath::new().path(&host_dir), &registry);

        let order: Vec<ScopeKey> = index.scopes().cloned().collect();
        assert_eq!(
            order,
            vec![
                ScopeKey::Unscoped,
                ScopeKey::plugin("zeta"),
                ScopeKey::plugin("alpha"),
                ScopeKey::plugin("mid"),
            ],
            "parallel={parallel}"
        );
        assert_eq!(
            index.entries_for_plugin("alpha").unwrap(),
            &bucket(&["com.alpha.Ext"])
        );
    }
}

#[test]
fn multiple_index_files_under_one_root_are_unioned() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    write_dir_index(&host_dir, "META-INF/services/com.acme.First", "a.A\nb.B\n");
    write_dir_index(&host_dir, "META-INF/services/com.acme.Second", "b.B\nc.C\n");

    let settings = IndexSettings::default().with_layout(StorageLayout::ServiceProvider);
    let (finder, _) = finder(settings);
    let index = finder.discover_global(&ClassPath::new().path(&host_dir));

    assert_eq!(index.global_entries().unwrap(), &bucket(&["a.A", "b.B", "c.C"]));
}

#[test]
fn traversal_is_one_level_deep() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    write_dir_index(&host_dir, "META-INF/services/com.acme.Top", "top.Ext\n");
    write_dir_index(&host_dir, "META-INF/services/nested/com.acme.Deep", "deep.Ext\n");

    let archive = temp.path().join("plugin.jar");
    write_archive(
        &archive,
        &[
            ("META-INF/", ""),
            ("META-INF/services/", ""),
            ("META-INF/services/com.acme.Top", "jar.Top\n"),
            ("META-INF/services/nested/", ""),
            ("META-INF/services/nested/com.acme.Deep", "jar.Deep\n"),
        ],
    );
    let mut registry = ScopeRegistry::new();
    registry
        .register("jarred", Arc::new(ClassPath::new().path(&archive)))
        .unwrap();

    let settings = IndexSettings::default().with_layout(StorageLayout::ServiceProvider);
    let (finder, diagnostics) = finder(settings);
    let index = finder.discover(&ClassPath::new().path(&host_dir), &registry);

    assert_eq!(index.global_entries().unwrap(), &bucket(&["top.Ext"]));
    assert_eq!(index.entries_for_plugin("jarred").unwrap(), &bucket(&["jar.Top"]));
    assert!(diagnostics.is_empty());
}

#[test]
fn archive_and_directory_roots_merge_into_one_scope() {
    let temp = tempfile::tempdir().unwrap();
    let classes = dir(temp.path(), "classes");
    write_dir_index(&classes, INDEX, "com.acme.Dir\ncom.acme.Shared\n");
    let lib = temp.path().join("lib.jar");
    write_archive(&lib, &[(INDEX, "# Generated\ncom.acme.Jar\ncom.acme.Shared # dup\n")]);

    let mut registry = ScopeRegistry::new();
    let loader = ClassPath::new()
        .entry(ClassPathEntry::Directory(classes))
        .entry(ClassPathEntry::Archive(lib.clone()))
        .entry(ClassPathEntry::Archive(lib));
    registry.register("mixed", Arc::new(loader)).unwrap();

    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover_per_plugin(&registry);

    assert_eq!(
        index.entries_for_plugin("mixed").unwrap(),
        &bucket(&["com.acme.Dir", "com.acme.Jar", "com.acme.Shared"])
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn archive_without_index_entry_is_empty_not_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let lib = temp.path().join("plain.jar");
    write_archive(&lib, &[("com/acme/Foo.class", "bytes")]);

    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover_global(&ClassPath::new().path(&lib));

    assert!(index.global_entries().unwrap().is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn corrupt_archive_is_reported_and_other_scopes_still_load() {
    let temp = tempfile::tempdir().unwrap();
    let broken = temp.path().join("broken.jar");
    fs::write(&broken, b"definitely not a zip archive").unwrap();
    let healthy_dir = dir(temp.path(), "healthy");
    write_dir_index(&healthy_dir, INDEX, "com.ok.Ext\n");

    let mut registry = ScopeRegistry::new();
    registry
        .register("broken", Arc::new(ClassPath::new().path(&broken)))
        .unwrap();
    registry
        .register("healthy", Arc::new(ClassPath::new().path(&healthy_dir)))
        .unwrap();

    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover_per_plugin(&registry);

    assert_eq!(index.len(), 2);
    assert!(index.entries_for_plugin("broken").unwrap().is_empty());
    assert_eq!(index.entries_for_plugin("healthy").unwrap(), &bucket(&["com.ok.Ext"]));
    let messages = diagnostics.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("broken.jar"));
}

#[test]
fn unreadable_index_content_drops_only_that_root() {
    let temp = tempfile::tempdir().unwrap();
    let bad_dir = dir(temp.path(), "bad");
    let good_dir = dir(temp.path(), "good");
    let path = bad_dir.join(INDEX);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, [b'a', 0xff, b'\n']).unwrap();
    write_dir_index(&good_dir, INDEX, "com.good.Ext\n");

    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover_global(&ClassPath::new().path(&bad_dir).path(&good_dir));

    assert_eq!(index.global_entries().unwrap(), &bucket(&["com.good.Ext"]));
    assert_eq!(diagnostics.messages().len(), 1);
}

#[test]
fn rediscovery_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let host_dir = dir(temp.path(), "host");
    write_dir_index(&host_dir, INDEX, "a.A\nb.B\na.A\n");
    let host = ClassPath::new().path(&host_dir);

    let (finder, _) = finder(IndexSettings::default());
    let first = finder.discover_global(&host);
    let second = finder.discover_global(&host);

    assert_eq!(first, second);
    assert_eq!(first.global_entries().unwrap().len(), 2);
}

struct UrlLoader {
    urls: Vec<String>,
}

impl ResourceLoader for UrlLoader {
    fn find_own_resources(&self, _relative: &str) -> Vec<ResourceLocation> {
        self.urls
            .iter()
            .filter_map(|url| ResourceLocation::from_url(url))
            .collect()
    }
}

#[test]
fn url_reporting_loader_resolves_jar_urls_and_skips_malformed_ones() {
    let temp = tempfile::tempdir().unwrap();
    let lib = temp.path().join("url.jar");
    write_archive(&lib, &[(INDEX, "com.url.Ext\n")]);
    let archive_url = format!("jar:file://{}!/{}", lib.display(), INDEX);

    let loader = UrlLoader {
        urls: vec!["::not a url::".to_string(), archive_url],
    };
    let (finder, diagnostics) = finder(IndexSettings::default());
    let index = finder.discover_global(&loader);

    assert_eq!(index.global_entries().unwrap(), &bucket(&["com.url.Ext"]));
    assert!(diagnostics.is_empty());
}
