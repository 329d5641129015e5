//! Turns decoded crate payloads into a [`SearchIndex`].

use super::desc::DescShard;
use super::fingerprint::{FingerprintBuilder, TypeFingerprint};
use super::item::{
    DescLocation, FunctionSignature, FunctionType, Item, ItemType, NameId, PathEntry, TypeRef,
};
use super::names::{SpecialTypes, TypeNames};
use super::raw::{RawCrate, RawSearchIndex};
use super::{CrateData, SearchIndex};
use crate::codec::{RawValue, RoaringBitmap, VlqHexDecoder};
use crate::error::{CorruptIndex, LoadError};
use ahash::AHashMap;
use std::sync::Arc;

/// Builds the queryable index from every crate of a payload, in order.
pub fn build_index(raw: &RawSearchIndex) -> Result<SearchIndex, LoadError> {
    let mut builder = IndexBuilder::new();
    for (crate_name, corpus) in &raw.0 {
        builder.add_crate(crate_name, corpus).map_err(|source| {
            tracing::warn!(crate_name = %crate_name, error = %source, "corrupt crate payload");
            LoadError::corrupt(crate_name, source)
        })?;
    }
    let index = builder.finish();
    tracing::info!(
        crates = index.crates.len(),
        items = index.items.len(),
        type_names = index.names.len(),
        "built search index"
    );
    Ok(index)
}

/// Hash-conses signature nodes while a build is running.
///
/// Identical subtrees (the same `&str`, the same `Option<T>`) appear in many
/// signatures. Only the most recent node per id is remembered.
#[derive(Debug, Default)]
struct TypePool {
    latest: AHashMap<TypeRef, Arc<FunctionType>>,
}

impl TypePool {
    fn intern(&mut self, ty: FunctionType) -> Arc<FunctionType> {
        if let Some(existing) = self.latest.get(&ty.id)
            && **existing == ty
        {
            return Arc::clone(existing);
        }
        let ty = Arc::new(ty);
        self.latest.insert(ty.id, Arc::clone(&ty));
        ty
    }
}

struct IndexBuilder {
    items: Vec<Item>,
    fingerprints: Vec<TypeFingerprint>,
    names: TypeNames,
    special: SpecialTypes,
    crates: Vec<CrateData>,
    pool: TypePool,
}

impl IndexBuilder {
    fn new() -> Self {
        let mut names = TypeNames::default();
        let special = SpecialTypes::register(&mut names);
        Self {
            items: Vec::new(),
            fingerprints: Vec::new(),
            names,
            special,
            crates: Vec::new(),
            pool: TypePool::default(),
        }
    }

    fn finish(self) -> SearchIndex {
        // the pool is dropped here; nothing after the build may intern
        SearchIndex {
            items: self.items,
            fingerprints: self.fingerprints,
            names: self.names,
            special: self.special,
            crates: self.crates,
        }
    }

    fn add_crate(&mut self, crate_name: &str, corpus: &RawCrate) -> Result<(), CorruptIndex> {
        let Self {
            items,
            fingerprints,
            names,
            special,
            crates,
            pool,
        } = self;

        let crate_name: Arc<str> = Arc::from(crate_name);
        let deprecated = RoaringBitmap::from_base64(&corpus.c)?;
        let empty_desc = RoaringBitmap::from_base64(&corpus.e)?;

        let mut shard_lengths = VlqHexDecoder::new(&corpus.d, |raw| match raw {
            RawValue::Int(n) if n >= 0 => Ok(n as usize),
            _ => Err(CorruptIndex::Malformed {
                what: "description shard length",
            }),
        });
        let mut shards = vec![DescShard {
            shard: 0,
            start: 0,
            len: shard_lengths.next_required()?,
        }];
        let mut desc_index = 0;

        let crate_row = items.len();
        let word = crate_name.to_lowercase();
        items.push(Item {
            id: crate_row,
            crate_name: Arc::clone(&crate_name),
            ty: ItemType::ExternCrate,
            name: crate_name.to_string(),
            normalized_name: word.replace('_', ""),
            word,
            path: Arc::from(""),
            exact_path: Arc::from(""),
            parent: None,
            signature: None,
            bit_index: 0,
            impl_disambiguator: None,
            desc: DescLocation {
                shard: 0,
                index: desc_index,
            },
        });
        fingerprints.push(TypeFingerprint::EMPTY);
        if !empty_desc.contains(0) {
            desc_index += 1;
        }

        let item_paths: AHashMap<usize, Arc<str>> = corpus
            .q
            .iter()
            .map(|(i, path)| (*i, Arc::from(path.as_str())))
            .collect();
        let reexports: AHashMap<usize, usize> = corpus.r.iter().copied().collect();
        let disambiguators: AHashMap<usize, &str> =
            corpus.b.iter().map(|(i, d)| (*i, d.as_str())).collect();

        let (paths, lowercase_paths) = resolve_path_table(corpus, &item_paths)?;

        let mut atoms = AtomDecoder {
            paths: &lowercase_paths,
            names,
            pool,
        };
        let mut signatures =
            VlqHexDecoder::new(&corpus.f, |raw| atoms.signature(raw));

        let first_item = items.len();
        let mut last_path: Arc<str> = Arc::from("");
        for (i, code) in corpus.t.chars().enumerate() {
            let bit_index = (i + 1) as u32;
            let has_desc = !empty_desc.contains(bit_index);
            if let Some(&current) = shards.last()
                && desc_index >= current.len
                && has_desc
            {
                shards.push(DescShard {
                    shard: current.shard + 1,
                    start: current.start + current.len,
                    len: shard_lengths.next_required()?,
                });
                desc_index = 0;
            }

            let name = corpus.n.get(i).cloned().unwrap_or_default();
            let word = name.to_lowercase();
            let path = item_paths
                .get(&i)
                .cloned()
                .unwrap_or_else(|| Arc::clone(&last_path));
            let exact_path = reexports
                .get(&i)
                .and_then(|key| item_paths.get(key))
                .cloned()
                .unwrap_or_else(|| Arc::clone(&path));
            let parent = match corpus.i.get(i).copied().unwrap_or(0) {
                0 => None,
                n => Some(
                    paths
                        .get(n - 1)
                        .cloned()
                        .ok_or(CorruptIndex::BadPathIndex(n))?,
                ),
            };

            let signature = signatures.next_required()?;
            let fingerprint = signature.as_deref().map_or(TypeFingerprint::EMPTY, |sig| {
                let mut fp = FingerprintBuilder::new(special);
                for ty in sig.all_types() {
                    fp.add_function_type(ty);
                }
                fp.finish()
            });

            items.push(Item {
                id: items.len(),
                crate_name: Arc::clone(&crate_name),
                ty: ItemType::from_code(code)?,
                name,
                normalized_name: word.replace('_', ""),
                word,
                path: Arc::clone(&path),
                exact_path,
                parent,
                signature,
                bit_index,
                impl_disambiguator: disambiguators.get(&i).map(|d| (*d).to_string()),
                desc: DescLocation {
                    shard: shards.len() - 1,
                    index: desc_index,
                },
            });
            fingerprints.push(fingerprint);
            last_path = path;
            if has_desc {
                desc_index += 1;
            }
        }

        let item_count = items.len() - first_item;
        let mut aliases: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (alias, locals) in &corpus.a {
            let targets = aliases.entry(alias.to_lowercase()).or_default();
            for &local in locals {
                if local >= item_count {
                    return Err(CorruptIndex::Malformed {
                        what: "alias target",
                    });
                }
                targets.push(first_item + local);
            }
        }

        tracing::debug!(crate_name = %crate_name, items = item_count, shards = shards.len(), "decoded crate");
        crates.push(CrateData {
            name: crate_name,
            doc: corpus.doc.clone(),
            deprecated,
            empty_desc,
            aliases,
            shards,
            crate_row,
            items: crate_row..items.len(),
        });
        Ok(())
    }
}

/// Resolves the crate's path table into display-case and lowercase entries.
///
/// A tuple without a path key has no path; one whose key is absent from `q`
/// inherits the previous resolved path.
fn resolve_path_table(
    corpus: &RawCrate,
    item_paths: &AHashMap<usize, Arc<str>>,
) -> Result<(Vec<Arc<PathEntry>>, Vec<PathEntry>), CorruptIndex> {
    let mut paths = Vec::with_capacity(corpus.p.len());
    let mut lowercase_paths = Vec::with_capacity(corpus.p.len());
    let mut last_path = item_paths.get(&0).cloned();
    for raw in &corpus.p {
        let ty = ItemType::from_ordinal(usize::from(raw.ty())).ok_or(CorruptIndex::Malformed {
            what: "path table item type",
        })?;
        let mut path = None;
        if let Some(key) = raw.path_key() {
            path = item_paths.get(&key).cloned().or_else(|| last_path.clone());
            last_path.clone_from(&path);
        }
        let exact_path = match raw.exact_path_key() {
            Some(key) => item_paths.get(&key).cloned(),
            None => path.clone(),
        };
        lowercase_paths.push(PathEntry {
            ty,
            name: raw.name().to_lowercase(),
            path: path.clone(),
            exact_path: exact_path.clone(),
        });
        paths.push(Arc::new(PathEntry {
            ty,
            name: raw.name().to_string(),
            path,
            exact_path,
        }));
    }
    Ok((paths, lowercase_paths))
}

/// Decodes signature atoms against one crate's path table.
struct AtomDecoder<'a> {
    paths: &'a [PathEntry],
    names: &'a mut TypeNames,
    pool: &'a mut TypePool,
}

impl AtomDecoder<'_> {
    fn signature(&mut self, raw: RawValue) -> Result<Option<Arc<FunctionSignature>>, CorruptIndex> {
        let parts = match raw {
            RawValue::Int(0) => return Ok(None),
            RawValue::Int(_) => {
                return Err(CorruptIndex::Malformed {
                    what: "function signature",
                });
            }
            RawValue::List(parts) => parts,
        };
        let mut sections = Vec::with_capacity(parts.len());
        for part in &parts {
            sections.push(self.section(part)?);
        }
        let mut sections = sections.into_iter();
        let inputs = sections.next().unwrap_or_default();
        let output = sections.next().unwrap_or_default();
        Ok(Some(Arc::new(FunctionSignature {
            inputs,
            output,
            where_clause: sections.collect(),
        })))
    }

    /// A bare integer is one type; a list is a list of types.
    fn section(&mut self, raw: &RawValue) -> Result<Vec<Arc<FunctionType>>, CorruptIndex> {
        match raw {
            RawValue::Int(_) => Ok(vec![self.atom(raw, false)?]),
            RawValue::List(types) => self.atoms(types),
        }
    }

    fn atoms(&mut self, types: &[RawValue]) -> Result<Vec<Arc<FunctionType>>, CorruptIndex> {
        types.iter().map(|t| self.atom(t, false)).collect()
    }

    fn atom(&mut self, raw: &RawValue, is_assoc_type: bool) -> Result<Arc<FunctionType>, CorruptIndex> {
        const MALFORMED: CorruptIndex = CorruptIndex::Malformed {
            what: "signature type",
        };
        let (path_index, generics, bindings) = match raw {
            RawValue::Int(n) => (*n, Vec::new(), Vec::new()),
            RawValue::List(parts) => {
                let Some(RawValue::Int(n)) = parts.first() else {
                    return Err(MALFORMED);
                };
                let generics = match parts.get(1) {
                    None => Vec::new(),
                    Some(RawValue::List(g)) => self.atoms(g)?,
                    Some(RawValue::Int(_)) => return Err(MALFORMED),
                };
                let bindings = match parts.get(2) {
                    None => Vec::new(),
                    Some(RawValue::List(b)) => self.bindings(b)?,
                    Some(RawValue::Int(_)) => return Err(MALFORMED),
                };
                (*n, generics, bindings)
            }
        };

        let ty = match path_index {
            n if n < 0 => FunctionType {
                id: TypeRef::Generic(n.unsigned_abs()),
                ty: Some(ItemType::Generic),
                path: None,
                exact_path: None,
                generics,
                bindings,
            },
            0 => FunctionType {
                id: TypeRef::Wildcard,
                ty: None,
                path: None,
                exact_path: None,
                generics,
                bindings,
            },
            n => {
                let index = n as usize;
                let entry = self
                    .paths
                    .get(index - 1)
                    .ok_or(CorruptIndex::BadPathIndex(index))?;
                FunctionType {
                    id: self
                        .names
                        .intern(&entry.name, is_assoc_type)
                        .map_or(TypeRef::Wildcard, TypeRef::Named),
                    ty: Some(entry.ty),
                    path: entry.path.clone(),
                    exact_path: entry.exact_path.clone(),
                    generics,
                    bindings,
                }
            }
        };
        Ok(self.pool.intern(ty))
    }

    fn bindings(
        &mut self,
        raw: &[RawValue],
    ) -> Result<Vec<(NameId, Vec<Arc<FunctionType>>)>, CorruptIndex> {
        const MALFORMED: CorruptIndex = CorruptIndex::Malformed {
            what: "associated type binding",
        };
        let mut bindings: Vec<(NameId, Vec<Arc<FunctionType>>)> = Vec::with_capacity(raw.len());
        for binding in raw {
            let Some([assoc, constraints]) = binding.as_list() else {
                return Err(MALFORMED);
            };
            let TypeRef::Named(key) = self.atom(assoc, true)?.id else {
                return Err(MALFORMED);
            };
            let constraints = match constraints {
                RawValue::List(c) => self.atoms(c)?,
                RawValue::Int(_) => return Err(MALFORMED),
            };
            match bindings.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = constraints,
                None => bindings.push((key, constraints)),
            }
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::raw::RawPath;
    use assert2::{check, let_assert};

    fn corpus() -> RawCrate {
        RawCrate {
            doc: "A demo crate".into(),
            // struct, fn, method, fn
            t: "FHNH".into(),
            n: vec!["Widget".into(), "make_widget".into(), "poke".into(), "other".into()],
            q: vec![(0, "demo".into()), (3, "demo::inner".into())],
            i: vec![0, 0, 1, 0],
            b: vec![(2, "impl-Widget".into())],
            p: vec![
                RawPath::WithPath(5, "Widget".into(), 0),
                RawPath::Bare(1, "u8".into()),
            ],
            // one shard of two descriptions, then one of three
            d: "df".into(),
            // crate row and item 2 have no description
            e: base64_of(&[0, 3]),
            // make_widget(u8) -> Widget, poke(&Widget), other: no signature
            f: "`{{d}{b}}{{b}}`".into(),
            a: [("gadget".to_string(), vec![0])].into_iter().collect(),
            ..RawCrate::default()
        }
    }

    fn base64_of(values: &[u16]) -> String {
        use base64::{Engine as _, engine::general_purpose::STANDARD};
        let mut bytes = vec![0x3a, 0x30, 0, 0, 1, 0, 0, 0, 0, 0];
        bytes.extend(((values.len() - 1) as u16).to_le_bytes());
        bytes.extend(16u32.to_le_bytes());
        for v in values {
            bytes.extend(v.to_le_bytes());
        }
        STANDARD.encode(bytes)
    }

    fn build(corpus: RawCrate) -> SearchIndex {
        let raw = RawSearchIndex(vec![("demo".to_string(), corpus)]);
        build_index(&raw).expect("payload decodes")
    }

    #[test]
    fn crate_row_precedes_items() {
        let index = build(corpus());
        let row = &index.items()[0];
        check!(row.ty == ItemType::ExternCrate);
        check!(row.name == "demo");
        check!(row.bit_index == 0);
        check!(&*row.path == "");
        check!(index.items().len() == 5);
        check!(index.crates()[0].doc == "A demo crate");
    }

    #[test]
    fn sparse_paths_inherit_the_last_one() {
        let index = build(corpus());
        let paths: Vec<&str> = index.items()[1..].iter().map(|i| &*i.path).collect();
        check!(paths == vec!["demo", "demo", "demo", "demo::inner"]);
    }

    #[test]
    fn parents_and_disambiguators() {
        let index = build(corpus());
        let poke = &index.items()[3];
        let_assert!(Some(parent) = &poke.parent);
        check!(parent.name == "Widget");
        check!(parent.ty == ItemType::Struct);
        check!(parent.path.as_deref() == Some("demo"));
        check!(poke.impl_disambiguator.as_deref() == Some("impl-Widget"));
    }

    #[test]
    fn signatures_decode_to_interned_atoms() {
        let index = build(corpus());
        let make = &index.items()[2];
        let_assert!(Some(sig) = &make.signature);
        let u8_id = index.names().get("u8");
        let widget_id = index.names().get("widget");
        check!(sig.inputs.len() == 1);
        check!(sig.inputs[0].id.name() == u8_id);
        check!(sig.output[0].id.name() == widget_id);
        check!(sig.output[0].ty == Some(ItemType::Struct));
        check!(index.items()[4].signature.is_none());
        check!(index.fingerprint(2).atom_count() == 2);
        check!(index.fingerprint(4) == TypeFingerprint::EMPTY);
    }

    #[test]
    fn description_slots_skip_empty_items() {
        let index = build(corpus());
        let locations: Vec<(usize, usize)> = index
            .items()
            .iter()
            .map(|i| (i.desc.shard, i.desc.index))
            .collect();
        // the crate row and bit 3 take no slot, so bit 3 does not open a shard
        check!(locations == vec![(0, 0), (0, 0), (0, 1), (0, 2), (1, 0)]);
        check!(index.crates()[0].shards.len() == 2);
        check!(index.crates()[0].shards[1].start == 2);
    }

    #[test]
    fn aliases_point_at_global_ids() {
        let index = build(corpus());
        check!(index.crates()[0].aliases.get("gadget") == Some(&vec![1]));
    }

    #[test]
    fn out_of_range_path_reference_is_corruption() {
        let mut corpus = corpus();
        corpus.f = "`{{j}{b}}``".into();
        let raw = RawSearchIndex(vec![("demo".to_string(), corpus)]);
        let_assert!(Err(LoadError::Corrupt { crate_name, source }) = build_index(&raw));
        check!(crate_name == "demo");
        check!(source == CorruptIndex::BadPathIndex(5));
    }

    #[test]
    fn missing_signatures_are_corruption() {
        let mut corpus = corpus();
        corpus.f = "``".into();
        let raw = RawSearchIndex(vec![("demo".to_string(), corpus)]);
        let_assert!(Err(LoadError::Corrupt { source: CorruptIndex::UnexpectedEnd { .. }, .. }) = build_index(&raw));
    }

    #[test]
    fn second_crate_ids_continue() {
        let raw = RawSearchIndex(vec![
            ("demo".to_string(), corpus()),
            ("next".to_string(), RawCrate {
                t: "H".into(),
                n: vec!["run".into()],
                d: "d".into(),
                f: "`".into(),
                a: [("go".to_string(), vec![0])].into_iter().collect(),
                ..RawCrate::default()
            }),
        ]);
        let_assert!(Ok(index) = build_index(&raw));
        check!(index.items()[5].ty == ItemType::ExternCrate);
        check!(index.items()[6].name == "run");
        check!(index.items()[6].id == 6);
        check!(index.crates()[1].aliases.get("go") == Some(&vec![6]));
    }

    #[test]
    fn pool_shares_identical_nodes() {
        let mut pool = TypePool::default();
        let node = || FunctionType {
            id: TypeRef::Generic(1),
            ty: Some(ItemType::Generic),
            path: None,
            exact_path: None,
            generics: Vec::new(),
            bindings: Vec::new(),
        };
        let a = pool.intern(node());
        let b = pool.intern(node());
        check!(Arc::ptr_eq(&a, &b));
    }
}
