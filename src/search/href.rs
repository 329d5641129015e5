//! Display paths and documentation links for result rows.

use crate::index::{Item, ItemType};

/// Where a result lives and how to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocation {
    /// Path prefix shown before the name, ending in `::` unless empty.
    pub display_path: String,
    pub href: String,
    /// `exact_path::name`, the key results are de-duplicated on.
    pub full_path: String,
}

fn url_path(path: &str) -> String {
    path.replace("::", "/")
}

/// Builds the display path and link for `item`, with hrefs relative to
/// `root_path` (normally `"../"`).
pub fn build_href_and_path(item: &Item, root_path: &str) -> ItemLocation {
    let ty = item.ty.as_str();
    let name = &item.name;
    let path = &*item.path;
    let mut exact_path = item.exact_path.to_string();

    let (display_path, href) = match item.ty {
        ItemType::Module => (
            format!("{path}::"),
            format!("{root_path}{}/{name}/index.html", url_path(path)),
        ),
        ItemType::Import => (
            format!("{path}::"),
            format!("{root_path}{}/index.html#reexport.{name}", url_path(path)),
        ),
        ItemType::Primitive | ItemType::Keyword => (
            String::new(),
            format!("{root_path}{}/{ty}.{name}.html", url_path(path)),
        ),
        ItemType::ExternCrate => (String::new(), format!("{root_path}{name}/index.html")),
        _ => match &item.parent {
            Some(parent) => {
                let mut anchor = format!("{ty}.{name}");
                let mut page_type = parent.ty.as_str().to_string();
                let mut page_name = parent.name.clone();
                let mut href_path = path.to_string();
                exact_path = format!(
                    "{}::{}",
                    parent.exact_path.as_deref().unwrap_or(path),
                    parent.name
                );

                let display_path = if parent.ty == ItemType::Primitive {
                    format!("{}::", parent.name)
                } else if item.ty == ItemType::StructField && parent.ty == ItemType::Variant {
                    // fields of enum variants live on the enum's page
                    let (module, enum_name) = path.rsplit_once("::").unwrap_or(("", path));
                    anchor = format!("variant.{}.field.{name}", parent.name);
                    page_type = ItemType::Enum.as_str().to_string();
                    page_name = enum_name.to_string();
                    href_path = module.to_string();
                    format!("{module}::{enum_name}::{}::", parent.name)
                } else {
                    format!("{path}::{}::", parent.name)
                };

                if let Some(disambiguator) = &item.impl_disambiguator {
                    anchor = format!("{disambiguator}/{anchor}");
                }
                let href = format!(
                    "{root_path}{}/{page_type}.{page_name}.html#{anchor}",
                    url_path(&href_path)
                );
                (display_path, href)
            }
            None => (
                format!("{path}::"),
                format!("{root_path}{}/{ty}.{name}.html", url_path(path)),
            ),
        },
    };

    ItemLocation {
        display_path,
        href,
        full_path: format!("{exact_path}::{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DescLocation, PathEntry};
    use assert2::check;
    use rstest::rstest;
    use std::sync::Arc;

    fn item(ty: ItemType, name: &str, path: &str, parent: Option<PathEntry>) -> Item {
        Item {
            id: 1,
            crate_name: Arc::from("demo"),
            ty,
            name: name.to_string(),
            word: name.to_lowercase(),
            normalized_name: name.to_lowercase().replace('_', ""),
            path: Arc::from(path),
            exact_path: Arc::from(path),
            parent: parent.map(Arc::new),
            signature: None,
            bit_index: 1,
            impl_disambiguator: None,
            desc: DescLocation { shard: 0, index: 0 },
        }
    }

    fn parent(ty: ItemType, name: &str, exact: Option<&str>) -> PathEntry {
        PathEntry {
            ty,
            name: name.to_string(),
            path: None,
            exact_path: exact.map(Arc::from),
        }
    }

    #[rstest]
    #[case(ItemType::Module, "io", "std", "std::", "../std/io/index.html")]
    #[case(ItemType::Import, "Thing", "demo::inner", "demo::inner::", "../demo/inner/index.html#reexport.Thing")]
    #[case(ItemType::Primitive, "u8", "std", "", "../std/primitive.u8.html")]
    #[case(ItemType::Keyword, "match", "std", "", "../std/keyword.match.html")]
    #[case(ItemType::ExternCrate, "demo", "", "", "../demo/index.html")]
    #[case(ItemType::Struct, "Vec", "std::vec", "std::vec::", "../std/vec/struct.Vec.html")]
    #[case(ItemType::Macro, "add", "demo", "demo::", "../demo/macro.add.html")]
    fn plain_items(
        #[case] ty: ItemType,
        #[case] name: &str,
        #[case] path: &str,
        #[case] display: &str,
        #[case] href: &str,
    ) {
        let location = build_href_and_path(&item(ty, name, path, None), "../");
        check!(location.display_path == display);
        check!(location.href == href);
        check!(location.full_path == format!("{path}::{name}"));
    }

    #[test]
    fn methods_link_to_their_parent_page() {
        let method = item(
            ItemType::TyMethod,
            "加上",
            "non_english_identifier",
            Some(parent(ItemType::Trait, "加法", Some("non_english_identifier"))),
        );
        let location = build_href_and_path(&method, "../");
        check!(location.display_path == "non_english_identifier::加法::");
        check!(location.href == "../non_english_identifier/trait.加法.html#tymethod.加上");
        check!(location.full_path == "non_english_identifier::加法::加上");
    }

    #[test]
    fn primitive_parents_show_only_the_primitive() {
        let method = item(
            ItemType::Method,
            "len",
            "core::slice",
            Some(parent(ItemType::Primitive, "slice", None)),
        );
        let location = build_href_and_path(&method, "./");
        check!(location.display_path == "slice::");
        check!(location.href == "./core/slice/primitive.slice.html#method.len");
        check!(location.full_path == "core::slice::slice::len");
    }

    #[test]
    fn variant_fields_live_on_the_enum_page() {
        let field = item(
            ItemType::StructField,
            "code",
            "demo::errors::Failure",
            Some(parent(ItemType::Variant, "Io", None)),
        );
        let location = build_href_and_path(&field, "../");
        check!(location.display_path == "demo::errors::Failure::Io::");
        check!(location.href == "../demo/errors/enum.Failure.html#variant.Io.field.code");
    }

    #[test]
    fn impl_disambiguator_prefixes_the_anchor() {
        let mut method = item(
            ItemType::Method,
            "from",
            "demo",
            Some(parent(ItemType::Struct, "Wrapper", Some("demo::inner"))),
        );
        method.impl_disambiguator = Some("impl-From%3Cu8%3E-for-Wrapper".to_string());
        let location = build_href_and_path(&method, "../");
        check!(location.href == "../demo/struct.Wrapper.html#impl-From%3Cu8%3E-for-Wrapper/method.from");
        check!(location.full_path == "demo::inner::Wrapper::from");
    }
}
