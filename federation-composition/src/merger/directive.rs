//! Directive definitions of the supergraph: executable directives common to every subgraph, and
//! the directives subgraphs asked to keep through `@composeDirective`.
use apollo_compiler::Name;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::collections::IndexMap;
use itertools::Itertools;

use super::MergeContext;
use super::fields::InputValuePosition;
use super::fields::merge_input_values;
use crate::error::HintCode;
use crate::link::Import;
use crate::link::Link;
use crate::subgraph::state::DirectiveDefinitionState;
use crate::subgraph::state::SubgraphState;
use crate::utils::human_readable::human_readable_subgraph_names;

pub(super) fn merge_directive_definitions(
    ctx: &mut MergeContext,
    states: &[SubgraphState],
) -> IndexMap<Name, DirectiveDefinitionState> {
    let mut by_name = IndexMap::<Name, Vec<(&str, &DirectiveDefinitionState)>>::default();
    for state in states {
        for definition in state.directives.values() {
            by_name
                .entry(definition.name.clone())
                .or_default()
                .push((state.graph.name.as_str(), definition));
        }
    }

    let mut merged = IndexMap::default();
    for (name, definitions) in by_name {
        if let Some((_, composed)) = definitions.iter().find(|(_, d)| d.composed) {
            merged.insert(name, (*composed).clone());
            continue;
        }
        if let Some(definition) = merge_executable_directive(ctx, states, &name, &definitions) {
            merged.insert(name, definition);
        }
    }
    merged
}

/// An executable directive survives only if every subgraph defines it, with the locations they
/// all share.
fn merge_executable_directive(
    ctx: &mut MergeContext,
    states: &[SubgraphState],
    name: &Name,
    definitions: &[(&str, &DirectiveDefinitionState)],
) -> Option<DirectiveDefinitionState> {
    if definitions.len() < states.len() {
        let defined_in = definitions.iter().map(|(graph, _)| *graph).collect_vec();
        let missing_in = states
            .iter()
            .map(|state| state.graph.name.as_str())
            .filter(|graph| !defined_in.contains(graph))
            .collect_vec();
        ctx.hint(
            HintCode::InconsistentExecutableDirectivePresence,
            format!(
                "Executable directive \"@{name}\" will not be part of the supergraph as it does not appear in all subgraphs: it is defined in {} but not in {}.",
                human_readable_subgraph_names(&defined_in),
                human_readable_subgraph_names(&missing_in),
            ),
        );
        return None;
    }

    let (_, first) = definitions.first()?;
    let locations: Vec<DirectiveLocation> = first
        .locations
        .iter()
        .filter(|location| {
            definitions
                .iter()
                .all(|(_, definition)| definition.locations.contains(location))
        })
        .copied()
        .collect();
    if locations.is_empty() {
        ctx.hint(
            HintCode::NoExecutableDirectiveLocationsIntersection,
            format!(
                "Executable directive \"@{name}\" has no location that is common to all subgraphs: it will not appear in the supergraph as there no intersection between location {}.",
                definitions
                    .iter()
                    .map(|(graph, definition)| format!(
                        "{} in subgraph \"{graph}\"",
                        definition.locations.iter().map(|l| l.name()).join(", ")
                    ))
                    .join(" and ")
            ),
        );
        return None;
    }

    let sources = definitions
        .iter()
        .map(|(graph, definition)| (*graph, &definition.args))
        .collect_vec();
    let args = merge_input_values(ctx, InputValuePosition::Argument, &format!("@{name}"), &sources);
    Some(DirectiveDefinitionState {
        name: name.clone(),
        description: definitions
            .iter()
            .find_map(|(_, definition)| definition.description.clone()),
        args,
        repeatable: definitions.iter().all(|(_, definition)| definition.repeatable),
        locations,
        composed: false,
    })
}

/// The `@link`s re-exporting composed directives, one per specification, at the highest version
/// any subgraph links.
pub(super) fn composed_links(states: &[SubgraphState]) -> Vec<Link> {
    let mut links: Vec<Link> = Vec::new();
    for state in states {
        for composed in state.links.composed_directives() {
            let import = Import {
                element: composed.element.clone(),
                is_directive: true,
                alias: (composed.name_in_schema != composed.element)
                    .then(|| composed.name_in_schema.clone()),
            };
            let identity = &composed.link.url.identity;
            match links
                .iter_mut()
                .find(|link| &link.url.identity == identity)
            {
                Some(link) => {
                    if composed.link.url.version > link.url.version {
                        link.url.version = composed.link.url.version;
                    }
                    if !link
                        .imports
                        .iter()
                        .any(|existing| existing.element == import.element)
                    {
                        link.imports.push(import);
                    }
                }
                None => links.push(Link {
                    url: composed.link.url.clone(),
                    spec_alias: None,
                    imports: vec![import],
                    purpose: None,
                }),
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::HintCode;
    use crate::merger::tests::merge;

    #[test]
    fn executable_directive_locations_intersect() {
        let (supergraph, errors, hints) = merge(&[
            (
                "a",
                "type Query { a: Int } directive @trace(level: Int) on FIELD | QUERY",
            ),
            (
                "b",
                "type Query { b: Int } directive @trace(level: Int, extra: String) repeatable on FIELD",
            ),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
        let trace = &supergraph.directives["trace"];
        assert_eq!(trace.locations.len(), 1);
        assert_eq!(trace.locations[0].name(), "FIELD");
        assert!(!trace.repeatable);
        assert_eq!(trace.args.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["level"]);
        assert_eq!(
            hints.iter().map(|h| h.code).collect::<Vec<_>>(),
            [HintCode::InconsistentArgumentPresence]
        );
    }

    #[test]
    fn executable_directive_missing_somewhere_is_dropped() {
        let (supergraph, _, hints) = merge(&[
            ("a", "type Query { a: Int } directive @trace on FIELD"),
            ("b", "type Query { b: Int }"),
        ]);
        assert!(!supergraph.directives.contains_key("trace"));
        assert_eq!(hints[0].code, HintCode::InconsistentExecutableDirectivePresence);
    }

    #[test]
    fn composed_directive_is_re_exported() {
        let (supergraph, errors, _) = merge(&[(
            "a",
            r#"
            extend schema
              @link(url: "https://custom.dev/cache/v1.2", import: ["@cached"])
              @composeDirective(name: "@cached")
            directive @cached(ttl: Int) on FIELD_DEFINITION
            type Query { a: Int @cached(ttl: 5) }
            "#,
        )]);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(supergraph.directives["cached"].composed);
        assert_eq!(supergraph.composed_links.len(), 1);
        assert_eq!(
            supergraph.composed_links[0].url.to_string(),
            "https://custom.dev/cache/v1.2"
        );
        assert_eq!(supergraph.composed_links[0].imports[0].element.as_str(), "cached");
        assert!(supergraph.composed_links[0].imports[0].alias.is_none());
    }
}
