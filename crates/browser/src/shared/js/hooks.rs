/// Installs the page-side activity counters once per document and returns
/// them. Child-list changes anywhere under the root bump a counter
/// (attribute changes do not count); router events are queued as
/// `{ type, url }` records. History is never patched.
pub const INSTALL_HOOKS: &str = r#"
() => {
    let hooks = window.__nextwatch;
    if (!hooks) {
        hooks = window.__nextwatch = { mutations: 0, router: [], routerBound: false };

        const root = document.documentElement;
        if (root && typeof MutationObserver !== 'undefined') {
            new MutationObserver(records => { hooks.mutations += records.length; })
                .observe(root, { childList: true, subtree: true, attributes: false });
        }
    }

    if (!hooks.routerBound) {
        const events = window.next && window.next.router && window.next.router.events;
        if (events && typeof events.on === 'function') {
            events.on('routeChangeStart', url => hooks.router.push({ type: 'routeChangeStart', url }));
            events.on('routeChangeComplete', () => hooks.router.push({ type: 'routeChangeComplete' }));
            events.on('routeChangeError', () => hooks.router.push({ type: 'routeChangeError' }));
            hooks.routerBound = true;
        }
    }

    return hooks;
}
"#;

/// Empties the queues filled by [`INSTALL_HOOKS`].
pub const DRAIN_ACTIVITY: &str = r#"
(hooks) => {
    const drained = { mutations: hooks.mutations, router: hooks.router.splice(0) };
    hooks.mutations = 0;
    return drained;
}
"#;
