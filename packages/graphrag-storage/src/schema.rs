pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_chunks.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_chunks.sql")),
				"tables/002_graph_nodes.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_graph_nodes.sql")),
				"tables/003_graph_edges.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_graph_edges.sql")),
				"tables/004_search_profiles.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_search_profiles.sql")),
				"tables/005_caller_profiles.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_caller_profiles.sql")),
				"tables/006_authority_weights.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_authority_weights.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

/// Splits rendered DDL into executable statements.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}
