//! Desired vs confirmed room subscriptions.

use std::collections::{BTreeMap, BTreeSet};

use sliding_sync_api::request::RoomSubscription;
use tracing::warn;

/// The rooms the caller wants direct subscriptions to, and the subset the
/// server has already been told about.
///
/// On every request the engine sends the diff between the two; on a
/// successful round trip exactly that diff is folded into `confirmed`.
///
/// Each subscribed room is transmitted with the default params template
/// unless it has been pinned to a named custom template, which callers use
/// to request more state for high-fidelity rooms (e.g. the one currently on
/// screen).
#[derive(Debug)]
pub(crate) struct SubscriptionSet {
    desired: BTreeSet<String>,
    confirmed: BTreeSet<String>,
    template: RoomSubscription,
    custom_templates: BTreeMap<String, RoomSubscription>,
    room_to_custom: BTreeMap<String, String>,
}

impl SubscriptionSet {
    pub(crate) fn new(template: RoomSubscription) -> Self {
        Self {
            desired: BTreeSet::new(),
            confirmed: BTreeSet::new(),
            template,
            custom_templates: BTreeMap::new(),
            room_to_custom: BTreeMap::new(),
        }
    }

    pub(crate) fn desired(&self) -> &BTreeSet<String> {
        &self.desired
    }

    pub(crate) fn set_desired(&mut self, rooms: BTreeSet<String>) {
        self.desired = rooms;
    }

    /// Replaces the default params template.
    ///
    /// Clears `confirmed` so every desired subscription is retransmitted
    /// with the new params on the next request.
    pub(crate) fn replace_template(&mut self, template: RoomSubscription) {
        self.template = template;
        self.confirmed.clear();
    }

    /// Registers a named custom params template. Re-registering an existing
    /// name is ignored.
    pub(crate) fn add_custom(&mut self, name: String, template: RoomSubscription) {
        if self.custom_templates.contains_key(&name) {
            warn!(%name, "ignoring duplicate custom subscription");
            return;
        }
        self.custom_templates.insert(name, template);
    }

    /// Pins `room_id` to the custom template `name`.
    ///
    /// Unknown template names are ignored. If the room's subscription was
    /// already confirmed it is un-confirmed, so the new params reach the
    /// server on the next request.
    pub(crate) fn use_custom(&mut self, room_id: String, name: &str) {
        if !self.custom_templates.contains_key(name) {
            warn!(name, "cannot use unknown custom subscription");
            return;
        }
        if self.room_to_custom.get(&room_id).is_some_and(|current| current == name) {
            return;
        }
        self.room_to_custom.insert(room_id.clone(), name.to_owned());
        self.confirmed.remove(&room_id);
    }

    /// The subscriptions to send: rooms newly desired and rooms to drop.
    pub(crate) fn diff(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let new = self.desired.difference(&self.confirmed).cloned().collect();
        let gone = self.confirmed.difference(&self.desired).cloned().collect();
        (new, gone)
    }

    /// The params to transmit for a subscription to `room_id`.
    pub(crate) fn params_for(&self, room_id: &str) -> &RoomSubscription {
        self.room_to_custom
            .get(room_id)
            .and_then(|name| self.custom_templates.get(name))
            .unwrap_or(&self.template)
    }

    /// Folds a successfully transmitted diff into `confirmed`.
    pub(crate) fn confirm(&mut self, new: &BTreeSet<String>, gone: &BTreeSet<String>) {
        for room_id in new {
            self.confirmed.insert(room_id.clone());
        }
        for room_id in gone {
            self.confirmed.remove(room_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use assign::assign;
    use js_int::uint;
    use maplit::btreeset;
    use sliding_sync_api::request::RoomSubscription;

    use super::SubscriptionSet;

    fn set() -> SubscriptionSet {
        SubscriptionSet::new(assign!(RoomSubscription::new(), {
            timeline_limit: Some(uint!(10)),
        }))
    }

    #[test]
    fn diff_is_desired_minus_confirmed_and_vice_versa() {
        let mut subs = set();
        subs.set_desired(btreeset! { "!a:s.org".to_owned(), "!b:s.org".to_owned() });
        subs.confirm(
            &btreeset! { "!b:s.org".to_owned(), "!c:s.org".to_owned() },
            &btreeset! {},
        );

        let (new, gone) = subs.diff();
        assert_eq!(new, btreeset! { "!a:s.org".to_owned() });
        assert_eq!(gone, btreeset! { "!c:s.org".to_owned() });
    }

    #[test]
    fn confirm_applies_exactly_the_sent_diff() {
        let mut subs = set();
        subs.set_desired(btreeset! { "!a:s.org".to_owned(), "!b:s.org".to_owned() });
        subs.confirm(&btreeset! { "!b:s.org".to_owned(), "!c:s.org".to_owned() }, &btreeset! {});

        let (new, gone) = subs.diff();
        subs.confirm(&new, &gone);

        let (new, gone) = subs.diff();
        assert!(new.is_empty());
        assert!(gone.is_empty());
    }

    #[test]
    fn replacing_the_template_clears_confirmed() {
        let mut subs = set();
        subs.set_desired(btreeset! { "!a:s.org".to_owned() });
        let (new, gone) = subs.diff();
        subs.confirm(&new, &gone);

        subs.replace_template(RoomSubscription::new());

        let (new, _) = subs.diff();
        assert_eq!(new, btreeset! { "!a:s.org".to_owned() });
    }

    #[test]
    fn custom_template_resolution() {
        let mut subs = set();
        let custom = assign!(RoomSubscription::new(), { timeline_limit: Some(uint!(50)) });
        subs.add_custom("opened_room".to_owned(), custom);

        subs.use_custom("!a:s.org".to_owned(), "opened_room");

        assert_eq!(subs.params_for("!a:s.org").timeline_limit, Some(uint!(50)));
        assert_eq!(subs.params_for("!b:s.org").timeline_limit, Some(uint!(10)));
    }

    #[test]
    fn pinning_a_confirmed_room_unconfirms_it() {
        let mut subs = set();
        subs.add_custom("opened_room".to_owned(), RoomSubscription::new());
        subs.set_desired(btreeset! { "!a:s.org".to_owned() });
        let (new, gone) = subs.diff();
        subs.confirm(&new, &gone);

        subs.use_custom("!a:s.org".to_owned(), "opened_room");

        let (new, _) = subs.diff();
        assert_eq!(new, btreeset! { "!a:s.org".to_owned() });
    }

    #[test]
    fn unknown_custom_names_are_ignored() {
        let mut subs = set();
        subs.set_desired(btreeset! { "!a:s.org".to_owned() });
        let (new, gone) = subs.diff();
        subs.confirm(&new, &gone);

        subs.use_custom("!a:s.org".to_owned(), "nope");

        let (new, _) = subs.diff();
        assert!(new.is_empty(), "pinning to an unknown template must not unconfirm the room");
    }

    #[test]
    fn duplicate_custom_registration_keeps_the_original() {
        let mut subs = set();
        subs.add_custom(
            "opened_room".to_owned(),
            assign!(RoomSubscription::new(), { timeline_limit: Some(uint!(50)) }),
        );
        subs.add_custom(
            "opened_room".to_owned(),
            assign!(RoomSubscription::new(), { timeline_limit: Some(uint!(1)) }),
        );

        subs.use_custom("!a:s.org".to_owned(), "opened_room");
        assert_eq!(subs.params_for("!a:s.org").timeline_limit, Some(uint!(50)));
    }
}
