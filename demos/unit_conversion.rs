//! Two-way unit conversion between stores

use backflow::{create_bidirectional_store, Derive, OriginList, OriginSlot, Reflect, SingleOrigin, Store};

fn main() {
    println!("=== Two-Way Store Example: Unit Conversion ===\n");

    // Celsius is the source of truth
    let celsius = Store::new(20.0_f64);
    let fahrenheit = create_bidirectional_store(
        SingleOrigin::new(celsius.clone()),
        Derive::sync(|c: &f64| c * 9.0 / 5.0 + 32.0),
        Reflect::sync(|f: &f64| (f - 32.0) * 5.0 / 9.0),
    )
    .unwrap();

    println!("1. Watching both stores");
    let _celsius = celsius.subscribe(|c| println!("   [Celsius] {:.1}", c));
    let _fahrenheit = fahrenheit.subscribe(|f| println!("   [Fahrenheit] {:.1}", f));

    println!("\n2. Setting Celsius");
    celsius.set(100.0);

    println!("\n3. Setting Fahrenheit");
    fahrenheit.set(32.0);

    println!("\n4. Nudging Fahrenheit up");
    fahrenheit.update(|f| *f += 18.0);

    // A duration split across two stores, edited as one number of seconds
    println!("\n5. Combining minutes and seconds");
    let minutes = Store::new(1_u64);
    let seconds = Store::new(30_u64);
    let total = create_bidirectional_store(
        OriginList::new(vec![OriginSlot::writable(minutes.clone()), OriginSlot::writable(seconds.clone())]).unwrap(),
        Derive::sync(|parts: &Vec<u64>| parts[0] * 60 + parts[1]),
        Reflect::sync(|total: &u64| vec![Some(total / 60), Some(total % 60)]),
    )
    .unwrap();
    let _total = total.subscribe(|t| println!("   [Total] {}s", t));

    println!("\n6. Setting the total");
    total.set(245);
    println!("   minutes: {}, seconds: {}", minutes.get(), seconds.get());

    println!("\n7. Setting the seconds directly");
    seconds.set(50);

    println!("\n✓ Example complete!");
}
