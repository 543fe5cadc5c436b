//! Binding form fields to one JSON document with path stores

use backflow::{create_path_store, Store};
use serde_json::json;

fn main() {
    println!("=== Path Store Example: Profile Form ===\n");

    // One document holds the whole form
    let form = Store::new(json!({
        "user": { "name": "Ada", "email": "ada@example.com" },
        "tags": ["math", "engines"],
    }));

    println!("1. Watching the whole document");
    let _document = form.subscribe(|doc| {
        println!("   [Form] {}", doc);
    });

    // One store per field
    let name = create_path_store(form.clone(), ["user", "name"]).unwrap();
    let email = create_path_store(form.clone(), ["user", "email"]).unwrap();
    let second_tag = create_path_store(form.clone(), vec![backflow::PathKey::from("tags"), 1usize.into()]).unwrap();

    println!("\n2. Watching the name field");
    let _name = name.subscribe(|value| {
        println!("   [Name field] {}", value);
    });

    println!("\n3. Typing into the name field");
    name.set(json!("Ada Lovelace"));

    println!("\n4. Editing the email field");
    email.update(|value| {
        *value = json!(value.as_str().unwrap_or_default().replace("example.com", "analytical.engine"));
    });

    println!("\n5. Replacing a tag");
    second_tag.set(json!("poetry"));

    println!("\n6. Loading a different profile");
    form.set(json!({
        "user": { "name": "Grace", "email": "grace@example.com" },
        "tags": [],
    }));

    println!("\n7. Field values after the load:");
    println!("   name:  {}", name.get());
    println!("   email: {}", email.get());
    println!("   tag:   {}", second_tag.get());

    println!("\n✓ Example complete!");
}
