//! Build-time generation pipeline.
//!
//! # Responsibility
//! - Run extraction and synthesis once per declared entity.
//! - Produce entity-to-repository bindings for the runtime registry and for
//!   external declaration emitters.
//!
//! # Invariants
//! - Output is sorted by entity name and is a pure function of the input.
//! - Diagnostics never abort generation of other entities.

use crate::metadata::diagnostic::Diagnostic;
use crate::metadata::extractor::MetadataExtractor;
use crate::model::declaration::EntityDeclaration;
use crate::model::descriptor::EntityDescriptor;
use crate::query::spec::QuerySpec;
use crate::query::synthesizer::synthesize;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Binding of one entity to the repository handle that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBinding {
    pub entity: String,
    pub qualified_name: String,
    pub repository: String,
}

/// Everything the generator produced for one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub descriptors: Vec<EntityDescriptor>,
    pub specs: BTreeMap<String, Vec<QuerySpec>>,
    pub bindings: Vec<RepositoryBinding>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SynthesisOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn descriptor(&self, entity: &str) -> Option<&EntityDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.name == entity)
    }

    pub fn specs_for(&self, entity: &str) -> &[QuerySpec] {
        self.specs.get(entity).map_or(&[], Vec::as_slice)
    }
}

/// Generates descriptors, specs and bindings for all declarations.
pub fn generate(declarations: &[EntityDeclaration]) -> SynthesisOutput {
    let mut extractor = MetadataExtractor::new();
    let mut descriptors: BTreeMap<String, EntityDescriptor> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for declaration in declarations {
        let Some(descriptor) = extractor.extract(declaration) else {
            continue;
        };
        if descriptors.contains_key(&descriptor.name) {
            let diagnostic = Diagnostic::error(
                &descriptor.name,
                None,
                "entity declared more than once; later declaration dropped",
            );
            diagnostic.log();
            diagnostics.push(diagnostic);
            continue;
        }
        descriptors.insert(descriptor.name.clone(), descriptor);
    }

    let known: BTreeSet<String> = descriptors.keys().cloned().collect();
    for descriptor in descriptors.values_mut() {
        drop_dangling_relations(descriptor, &known, &mut diagnostics);
    }

    let mut output = SynthesisOutput {
        diagnostics: extractor.into_diagnostics(),
        ..SynthesisOutput::default()
    };
    output.diagnostics.extend(diagnostics);

    for descriptor in descriptors.into_values() {
        output
            .specs
            .insert(descriptor.name.clone(), synthesize(&descriptor));
        output.bindings.push(RepositoryBinding {
            entity: descriptor.name.clone(),
            qualified_name: descriptor.qualified_name.clone(),
            repository: descriptor.repository_name(),
        });
        output.descriptors.push(descriptor);
    }

    info!(
        "event=generate module=query status=ok entities={} specs={} diagnostics={}",
        output.descriptors.len(),
        output.specs.values().map(Vec::len).sum::<usize>(),
        output.diagnostics.len()
    );

    output
}

fn drop_dangling_relations(
    descriptor: &mut EntityDescriptor,
    known: &BTreeSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let entity = descriptor.name.clone();
    descriptor.fields.retain(|field| match field.related_entity() {
        Some(target) if !known.contains(target) => {
            let diagnostic = Diagnostic::error(
                &entity,
                Some(&field.name),
                format!("relation targets undeclared entity `{target}`; field dropped"),
            );
            diagnostic.log();
            diagnostics.push(diagnostic);
            false
        }
        _ => true,
    });
}
