use tidewater_transform::TableTransform;
use tidewater_types::SourceTable;

/// Execute the `tables` command: print the table registry.
pub fn execute() {
    println!("{:16} {:10} {:24} {:24} TRANSFORM", "TABLE", "KIND", "TARGET", "PRIMARY KEY");
    for table in SourceTable::ALL {
        let (target, key) = table
            .relation()
            .map_or(("-", "-"), |r| (r.target_table, r.primary_key));
        println!(
            "{:16} {:10} {:24} {:24} {}",
            table.name(),
            table.kind().to_string(),
            target,
            key,
            TableTransform::for_table(table).describe()
        );
    }
}
