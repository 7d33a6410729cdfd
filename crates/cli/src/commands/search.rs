//! `supportdesk search`: Look a query up in the knowledge base.

use supportdesk_knowledge::DocumentStore;

pub fn run(query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = DocumentStore::load(&config.knowledge_base_path)?;

    for article in store.search(query) {
        if article.is_sentinel() {
            println!("  {}", article.title);
            println!("    {}", article.content);
            continue;
        }
        println!("  [{}] {}", article.category, article.title);
        println!("    {}", article.content);
        println!();
    }

    Ok(())
}
