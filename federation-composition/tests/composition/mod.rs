mod compose_inaccessible;
mod compose_types;
mod override_directive;
mod satisfiability;
mod validation_errors;

pub(crate) mod test_helpers {
    use federation_composition::CompositionError;
    use federation_composition::CompositionOptions;
    use federation_composition::Subgraph;
    use federation_composition::Supergraph;
    use federation_composition::compose_with_options;

    const FEDERATION_LINK: &str = r#"extend schema @link(url: "https://specs.apollo.dev/federation/v2.9", import: ["@key", "@external", "@requires", "@provides", "@shareable", "@override", "@tag", "@inaccessible", "@interfaceObject", "@extends", "@composeDirective", "@authenticated", "@requiresScopes", "@policy"])"#;

    pub(crate) struct ServiceDefinition<'a> {
        pub(crate) name: &'a str,
        pub(crate) type_defs: &'a str,
    }

    /// Composes a set of subgraphs as if they had the latest federation 2 spec link in them, with
    /// all federation directives imported.
    pub(crate) fn compose_as_fed2_subgraphs(
        service_list: &[ServiceDefinition<'_>],
    ) -> Result<Supergraph, Vec<CompositionError>> {
        compose_as_fed2_subgraphs_with_options(service_list, &CompositionOptions::default())
    }

    pub(crate) fn compose_as_fed2_subgraphs_with_options(
        service_list: &[ServiceDefinition<'_>],
        options: &CompositionOptions,
    ) -> Result<Supergraph, Vec<CompositionError>> {
        let mut subgraphs = Vec::new();
        let mut errors = Vec::new();
        for service in service_list {
            let result = Subgraph::parse(
                service.name,
                Some(&format!("http://{}", service.name)),
                &format!("{FEDERATION_LINK}\n{}", service.type_defs),
            );
            match result {
                Ok(subgraph) => subgraphs.push(subgraph),
                Err(err) => errors.extend(err.composition_errors().iter().cloned()),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        compose_with_options(&subgraphs, options).map_err(|err| {
            assert!(!err.is_internal(), "{err}");
            err.composition_errors().to_vec()
        })
    }

    /// The error codes of a failed composition, in order.
    pub(crate) fn error_codes(errors: &[CompositionError]) -> Vec<&'static str> {
        errors.iter().map(|error| error.code().code()).collect()
    }
}

pub(crate) use test_helpers::ServiceDefinition;
pub(crate) use test_helpers::compose_as_fed2_subgraphs;
pub(crate) use test_helpers::compose_as_fed2_subgraphs_with_options;
pub(crate) use test_helpers::error_codes;
