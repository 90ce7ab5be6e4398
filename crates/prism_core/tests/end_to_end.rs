//! Property lifecycle through real objects: registration, precedence, eager
//! notification and digest-driven bindings

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use prism_core::{
    dependency_object_type, DependencyObject, DependencyProperty, DigestList, PropertyError,
    PropertyMetadata, PropertyRegistry, StaticView, TypeInfo, ValueSource, View,
};

struct Widget;
struct Slider;
struct Settings {
    brightness: Mutex<f32>,
}

static WIDGET_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Widget>("Widget")
        .base(dependency_object_type())
        .build()
});

static SLIDER_TYPE: LazyLock<TypeInfo> =
    LazyLock::new(|| TypeInfo::class::<Slider>("Slider").base(&WIDGET_TYPE).build());

static SETTINGS_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Settings>("Settings")
        .property(
            "Brightness",
            |s: &Settings| *s.brightness.lock().unwrap(),
            |s: &Settings, v| *s.brightness.lock().unwrap() = v,
        )
        .build()
});

fn counting_opacity(registry: &PropertyRegistry) -> (DependencyProperty<f32>, Arc<AtomicUsize>) {
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let opacity = registry
        .register_typed::<f32>(
            "Opacity",
            &WIDGET_TYPE,
            PropertyMetadata::new()
                .default_value(1.0f32)
                .on_changed(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .unwrap();
    (opacity, changes)
}

fn settings(brightness: f32) -> Arc<Settings> {
    Arc::new(Settings {
        brightness: Mutex::new(brightness),
    })
}

#[test]
fn test_opacity_brightness_scenario() {
    let registry = PropertyRegistry::new();
    let (opacity, changes) = counting_opacity(&registry);

    let widget = DependencyObject::new(&WIDGET_TYPE).unwrap();
    let list = DigestList::new();
    widget.attach_digest_list(&list);
    assert_eq!(widget.get_value(&opacity), 1.0);

    // Local set outside the digest cycle notifies immediately
    widget.set_value(&opacity, 0.5);
    assert_eq!(widget.get_value(&opacity), 0.5);
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert!(!widget.requires_digest());
    assert!(list.is_empty());

    let view_model = settings(0.25);
    let view: Arc<dyn View> = Arc::new(StaticView::new(view_model.clone()));
    widget.set_view(Some(view));
    widget
        .bind(&opacity, &SETTINGS_TYPE, "{{Brightness}}")
        .unwrap();
    assert!(widget.requires_digest());
    assert_eq!(list.len(), 1);
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    let t = Duration::from_millis(16);
    list.digest(t);
    assert_eq!(widget.get_value(&opacity), 0.25);
    assert_eq!(widget.value_source(&opacity), ValueSource::Bound);
    assert_eq!(changes.load(Ordering::SeqCst), 2);

    // Stale until the next digest
    *view_model.brightness.lock().unwrap() = 0.75;
    assert_eq!(widget.get_value(&opacity), 0.25);
    assert_eq!(widget.get_fresh_value(&opacity), 0.75);

    list.digest(t + Duration::from_millis(16));
    assert_eq!(widget.get_value(&opacity), 0.75);
    assert_eq!(changes.load(Ordering::SeqCst), 3);

    // Nothing changed: a second digest is silent
    list.digest(t + Duration::from_millis(32));
    assert_eq!(changes.load(Ordering::SeqCst), 3);
}

#[test]
fn test_registration_uniqueness() {
    let registry = PropertyRegistry::new();
    let first = registry
        .register_typed::<f32>("Value", &WIDGET_TYPE, PropertyMetadata::new())
        .unwrap();

    let duplicate = registry.register_typed::<f32>("Value", &WIDGET_TYPE, PropertyMetadata::new());
    assert_eq!(
        duplicate.unwrap_err(),
        PropertyError::DuplicateRegistration {
            owner: "Widget",
            name: "Value".to_string(),
        }
    );

    let derived = registry
        .register_typed::<f32>("Value", &SLIDER_TYPE, PropertyMetadata::new())
        .unwrap();
    assert_ne!(first.id(), derived.id());
}

#[test]
fn test_inheritance_aware_lookup() {
    let registry = PropertyRegistry::new();
    let opacity = registry
        .register_typed::<f32>("Opacity", &WIDGET_TYPE, PropertyMetadata::new())
        .unwrap();

    let found = registry
        .find_by_name("Opacity", &SLIDER_TYPE)
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), opacity.id());
    assert_eq!(found.owner().name(), "Widget");
    assert!(registry
        .find_by_name("Missing", &SLIDER_TYPE)
        .unwrap()
        .is_none());
    assert_eq!(
        registry.find_by_name("Opacity", &SETTINGS_TYPE).unwrap_err(),
        PropertyError::NotAParticipant("Settings")
    );
}

#[test]
fn test_precedence_through_clears() {
    let registry = PropertyRegistry::new();
    let (opacity, changes) = counting_opacity(&registry);
    let slider = DependencyObject::new(&SLIDER_TYPE).unwrap();

    slider.set_styled(&opacity, 0.6);
    assert_eq!(slider.get_value(&opacity), 0.6);
    assert_eq!(slider.value_source(&opacity), ValueSource::Styled);

    slider.set_value(&opacity, 0.3);
    assert_eq!(slider.get_value(&opacity), 0.3);
    assert_eq!(slider.value_source(&opacity), ValueSource::Local);

    // Styled changes under a local value are invisible
    slider.set_styled(&opacity, 0.7);
    assert_eq!(slider.get_value(&opacity), 0.3);
    assert_eq!(changes.load(Ordering::SeqCst), 2);

    slider.clear_value(&opacity);
    assert_eq!(slider.get_value(&opacity), 0.7);
    slider.clear_styled(&opacity);
    assert_eq!(slider.get_value(&opacity), 1.0);
    assert_eq!(slider.value_source(&opacity), ValueSource::Default);
    assert_eq!(changes.load(Ordering::SeqCst), 4);
}

#[test]
fn test_unbind_falls_back_to_local() {
    let registry = PropertyRegistry::new();
    let (opacity, changes) = counting_opacity(&registry);
    let widget = DependencyObject::new(&WIDGET_TYPE).unwrap();
    let view: Arc<dyn View> = Arc::new(StaticView::new(settings(0.1)));
    widget.set_view(Some(view));

    widget.set_value(&opacity, 0.4);
    widget.bind(&opacity, &SETTINGS_TYPE, "Brightness").unwrap();
    // Unpolled bindings do not mask lower sources
    assert_eq!(widget.get_value(&opacity), 0.4);

    widget.digest(Duration::ZERO);
    assert_eq!(widget.get_value(&opacity), 0.1);

    widget.unbind(&opacity);
    assert!(!widget.requires_digest());
    assert_eq!(widget.get_value(&opacity), 0.4);
    assert_eq!(changes.load(Ordering::SeqCst), 3);
}

#[test]
fn test_dropped_objects_leave_digest_list() {
    let registry = PropertyRegistry::new();
    let (opacity, _) = counting_opacity(&registry);
    let list = DigestList::new();

    let widget = DependencyObject::new(&WIDGET_TYPE).unwrap();
    widget.attach_digest_list(&list);
    widget.bind(&opacity, &SETTINGS_TYPE, "Brightness").unwrap();
    assert_eq!(list.len(), 1);

    drop(widget);
    assert!(list.is_empty());
    list.digest(Duration::ZERO);
}

#[test]
fn test_rebinding_same_expression_is_a_no_op() {
    let registry = PropertyRegistry::new();
    let (opacity, changes) = counting_opacity(&registry);
    let widget = DependencyObject::new(&WIDGET_TYPE).unwrap();
    let view_model = settings(0.25);
    let view: Arc<dyn View> = Arc::new(StaticView::new(view_model.clone()));
    widget.set_view(Some(view));

    widget.bind(&opacity, &SETTINGS_TYPE, "{{Brightness}}").unwrap();
    widget.digest(Duration::ZERO);
    assert_eq!(widget.get_value(&opacity), 0.25);
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    // The cached value survives; a fresh binding would be unpolled
    *view_model.brightness.lock().unwrap() = 0.9;
    widget.bind(&opacity, &SETTINGS_TYPE, "{{Brightness}}").unwrap();
    assert_eq!(widget.get_value(&opacity), 0.25);
    assert_eq!(widget.value_source(&opacity), ValueSource::Bound);
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    widget.digest(Duration::from_millis(16));
    assert_eq!(widget.get_value(&opacity), 0.9);
    assert_eq!(changes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fresh_read_without_view_matches_next_digest() {
    let registry = PropertyRegistry::new();
    let (opacity, _) = counting_opacity(&registry);
    let widget = DependencyObject::new(&WIDGET_TYPE).unwrap();
    let view: Arc<dyn View> = Arc::new(StaticView::new(settings(0.3)));
    widget.set_view(Some(view));

    widget.bind(&opacity, &SETTINGS_TYPE, "{{Brightness}}").unwrap();
    widget.digest(Duration::ZERO);
    assert_eq!(widget.get_value(&opacity), 0.3);

    widget.set_view(None);
    assert_eq!(widget.get_value(&opacity), 0.3);
    assert_eq!(widget.get_fresh_value(&opacity), 0.0);

    widget.digest(Duration::from_millis(16));
    assert_eq!(widget.get_value(&opacity), 0.0);
}
