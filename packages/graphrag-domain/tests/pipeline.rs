use graphrag_domain::{
	AuthorityTable, DictionaryExtractor, GraphEdge, Modality, ModalityMap, PackingOptions,
	RankedItem, SourceRef, Traversal, authority, entity, evidence, fusion,
};

fn source(source_id: &str) -> SourceRef {
	SourceRef { source_id: source_id.to_string(), ..Default::default() }
}

fn edge(edge_id: &str, from: &str, to: &str) -> GraphEdge {
	GraphEdge {
		edge_id: edge_id.to_string(),
		from: from.to_string(),
		to: to.to_string(),
		edge_type: "related_to".to_string(),
	}
}

fn graph_items(seed: &str, edges: &[GraphEdge], max_hops: u32) -> Vec<RankedItem> {
	let mut traversal = Traversal::new([seed]);

	while traversal.depth() < max_hops && !traversal.is_exhausted() {
		traversal.advance(edges, 50);
	}

	traversal
		.paths()
		.into_iter()
		.map(|(node_id, path)| {
			let mut item = RankedItem::new(
				format!("chunk-{node_id}"),
				Modality::Graph,
				path.score as f32,
				format!("about {node_id}"),
				source("kb"),
			);

			item.evidence = Some(path);

			item
		})
		.collect()
}

#[test]
fn dictionary_seed_walks_two_hops() {
	let dictionary = DictionaryExtractor::builtin().expect("Builtin dictionary must compile.");
	let entities = dictionary.extract("Is Keytruda approved for melanoma?");

	assert_eq!(entities[0].entity_type, "drug");
	assert_eq!(entity::normalize_name(&entities[0].text), "keytruda");

	let edges = [edge("e1", "n1", "n2"), edge("e2", "n3", "n2")];
	let items = graph_items("n1", &edges, 2);
	let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();

	assert_eq!(ids, vec!["chunk-n1", "chunk-n2", "chunk-n3"]);

	let far = items[2].evidence.as_ref().expect("Graph items carry evidence.");

	assert_eq!(far.nodes, vec!["n1", "n2", "n3"]);
	assert_eq!(far.edges, vec!["e1", "e2"]);
	assert_eq!(far.hop_count(), 2);
}

#[test]
fn hop_limit_stops_expansion() {
	let edges = [edge("e1", "n1", "n2"), edge("e2", "n2", "n3")];
	let items = graph_items("n1", &edges, 1);

	assert_eq!(items.len(), 2);
}

#[test]
fn fused_graph_and_vector_results_pack_with_authority() {
	let edges = [edge("e1", "n1", "n2"), edge("e2", "n2", "n3")];
	let graph = graph_items("n1", &edges, 2);
	let vector = vec![
		RankedItem::new("chunk-n3", Modality::Vector, 0.9, "about n3", source("fda")),
		RankedItem::new("chunk-x", Modality::Vector, 0.8, "unrelated", source("blog")),
	];
	let lists = ModalityMap::new(vector, Vec::new(), graph.clone());
	let weights = fusion::normalize_weights(
		&ModalityMap::new(0.5, 0.5, 0.5),
		&ModalityMap::new(true, false, true),
	);

	assert_eq!(weights, ModalityMap::new(0.5, 0.0, 0.5));

	let mut fused = fusion::fuse(&lists, &weights, fusion::DEFAULT_RRF_K, 10);
	let fused_ids: Vec<&str> = fused.iter().map(|result| result.id.as_str()).collect();

	assert_eq!(fused_ids, vec!["chunk-n3", "chunk-n1", "chunk-x", "chunk-n2"]);
	assert_eq!(fused[0].modalities, vec![Modality::Vector, Modality::Graph]);
	assert_eq!(fused[0].ranks, ModalityMap::new(Some(1), None, Some(3)));
	assert!(fused[0].evidence.is_some());

	let mut table = AuthorityTable::default();

	table.sources.insert("fda".to_string(), 1.0);
	table.sources.insert("blog".to_string(), 0.0);

	authority::apply_authority(&mut fused, &table);

	let boosted: Vec<&str> = fused.iter().map(|result| result.id.as_str()).collect();

	assert_eq!(boosted, vec!["chunk-n3", "chunk-n1", "chunk-n2", "chunk-x"]);

	let packed = evidence::build_context(&fused, PackingOptions {
		max_tokens: 1_000,
		max_chunks: 3,
		include_citations: true,
		chars_per_token: 4,
	});
	let markers: Vec<&str> =
		packed.chunks.iter().filter_map(|chunk| chunk.citation.as_deref()).collect();

	assert_eq!(markers, vec!["[1]", "[2]", "[3]"]);
	assert_eq!(packed.chunks[0].text, "about n3 [1]");
	assert_eq!(packed.citations[2].chunk_id, "chunk-n2");
	assert_eq!(evidence::collect_evidence(&graph).len(), 3);
}
