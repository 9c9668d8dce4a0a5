use std::time::Duration;

use chat_pacing::{
    shared, DeliveryQueue, FixedRandom, FragmentEvent, MessageKind, PacingConfig, Priority,
    QueuedItem, ResponsePacer, ResponsePayload,
};
use tokio::sync::broadcast;

fn pacer() -> ResponsePacer {
    ResponsePacer::with_random(&PacingConfig::default(), shared(FixedRandom::constant(0.5)))
}

fn item(id: &str, text: &str, priority: Priority) -> QueuedItem {
    QueuedItem::new(
        ResponsePayload::new(text, "companion-1", "user-1"),
        MessageKind::Fragment,
    )
    .with_id(id)
    .with_priority(priority)
}

fn drain_events(rx: &mut broadcast::Receiver<FragmentEvent>) -> Vec<FragmentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn position(events: &[FragmentEvent], name: &str, id: &str) -> usize {
    events
        .iter()
        .position(|e| e.name() == name && e.sequence_id() == id)
        .unwrap_or_else(|| panic!("missing {} for {}", name, id))
}

#[tokio::test(start_paused = true)]
async fn queued_responses_play_one_at_a_time_in_priority_order() {
    let pacer = pacer();
    let mut rx = pacer.sequencer().subscribe();
    let queue = DeliveryQueue::new(PacingConfig::default().queue, pacer.clone());

    queue.enqueue(item("later", "Sure, I can do that.", Priority::Low));
    queue.enqueue(item("first", "Oh wow, really?", Priority::Urgent));
    queue.wait_idle().await;

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 8);

    let first_done = position(&events, "sequence_completed", "first");
    let later_start = position(&events, "sequence_started", "later");
    assert!(first_done < later_start);
    assert_eq!(queue.processed_count(), 2);
    assert_eq!(queue.failed_count(), 0);
    assert!(!pacer.sequencer().has_active_sequences());
}

#[tokio::test(start_paused = true)]
async fn long_response_is_displayed_fragment_by_fragment() {
    let pacer = pacer();
    let mut rx = pacer.sequencer().subscribe();
    let queue = DeliveryQueue::new(PacingConfig::default().queue, pacer.clone());

    let text = "I finally finished the book you lent me last month. \
                The ending caught me completely off guard, honestly. \
                Also, I think the middle chapters dragged a little bit. \
                Anyway, we should talk about it over coffee sometime soon!";
    queue.enqueue(item("book", text, Priority::Normal));
    queue.wait_idle().await;

    let events = drain_events(&mut rx);
    let fragments = events
        .iter()
        .find_map(|e| match e {
            FragmentEvent::SequenceCompleted { sequence } => Some(sequence.fragments.clone()),
            _ => None,
        })
        .expect("sequence completed");
    assert!(fragments.len() > 1);

    let records: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            FragmentEvent::FragmentDisplayed { record } => Some(record.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(records.len(), fragments.len());
    for (index, record) in records.iter().enumerate() {
        assert_eq!(record.fragment_index, index);
        assert_eq!(record.total_fragments, fragments.len());
        assert_eq!(record.text, fragments[index]);
        assert_eq!(record.show_avatar, index + 1 == fragments.len());
        assert!(!record.forced);
    }
}

#[tokio::test(start_paused = true)]
async fn cancelling_in_flight_sequence_releases_the_queue() {
    let pacer = pacer();
    let mut rx = pacer.sequencer().subscribe();
    let queue = DeliveryQueue::new(PacingConfig::default().queue, pacer.clone());

    queue.enqueue(item("a", "Let me think about that for a second.", Priority::Normal));
    queue.enqueue(item("b", "Okay, got it.", Priority::Normal));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pacer.sequencer().active_sequence_ids(), vec!["a".to_string()]);
    assert!(pacer.sequencer().cancel("a"));

    queue.wait_idle().await;

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .all(|e| !(e.sequence_id() == "a" && e.name() == "fragment_displayed")));
    let cancelled = position(&events, "sequence_cancelled", "a");
    let b_started = position(&events, "sequence_started", "b");
    assert!(cancelled < b_started);
    position(&events, "sequence_completed", "b");
}
