/// Reads everything the signal evaluators look at, in the shape of
/// `DocumentSnapshot`'s JSON form.
pub const SNAPSHOT: &str = r#"
(containers) => {
    const body = document.body;
    const nextData = window.__NEXT_DATA__;
    const generator = document.querySelector('meta[name="generator"]');

    let paint = { status: 'unavailable' };
    try {
        const supported = typeof PerformanceObserver !== 'undefined'
            && (PerformanceObserver.supportedEntryTypes || []).includes('paint');
        if (supported) {
            const fcp = performance.getEntriesByType('paint')
                .find(e => e.name === 'first-contentful-paint');
            paint = { status: 'observed', firstContentfulPaint: fcp ? fcp.startTime : null };
        }
    } catch (_) {}

    return {
        readyState: document.readyState,
        location: window.location.pathname + window.location.search,
        hasNextData: nextData !== undefined && nextData !== null,
        nextDataHasProps: !!(nextData && nextData.props),
        hasNextRuntime: !!(window.next && window.next.router),
        scriptSources: Array.from(document.querySelectorAll('script[src]')).map(s => s.src),
        metaGenerator: generator ? generator.getAttribute('content') : null,
        hasRouteAnnouncer: !!document.querySelector('[aria-live="assertive"]#__next-route-announcer__'),
        hasHydrationMarkers: !!document.querySelector('[data-reactroot], [data-reactid]'),
        hasObfuscatedClasses: !!(body && body.querySelector('[class*="__"]')),
        hasBody: !!body,
        bodyChildren: body ? body.children.length : 0,
        contentTextLengths: body
            ? Array.from(body.querySelectorAll(containers)).map(el => (el.textContent || '').trim().length)
            : [],
        images: Array.from(document.images).map(img => ({
            complete: img.complete,
            naturalHeight: img.naturalHeight
        })),
        paint
    };
}
"#;
